//! In-crate statistical learners used as student and ensembler base models.
//!
//! All learners are plain serde-serializable structs fit on a dense matrix
//! plus 0/1 targets, and all expose a probability-valued decision function.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

fn sigmoid(z: f32) -> f32 {
    1.0 / (1.0 + (-z).exp())
}

// ---------------------------------------------------------------------------
// Logistic regression
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    pub learning_rate: f32,
    pub epochs: usize,
    pub l2: f32,
}

impl Default for LogisticParams {
    fn default() -> Self {
        LogisticParams {
            learning_rate: 0.3,
            epochs: 400,
            l2: 1e-4,
        }
    }
}

/// Binary logistic regression: `sigmoid(w . x + b)`, fit by full-batch
/// gradient descent. Inputs are expected pre-scaled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub weights: Vec<f32>,
    pub bias: f32,
}

impl LogisticRegression {
    pub fn fit(x: &Array2<f32>, y: &[f32], params: &LogisticParams) -> Self {
        let (nrows, ncols) = (x.nrows(), x.ncols());
        let mut weights = vec![0.0f32; ncols];
        let mut bias = 0.0f32;
        let inv_n = 1.0 / nrows.max(1) as f32;

        for _ in 0..params.epochs {
            let mut grad_w = vec![0.0f32; ncols];
            let mut grad_b = 0.0f32;
            for r in 0..nrows {
                let mut z = bias;
                for c in 0..ncols {
                    z += weights[c] * x[(r, c)];
                }
                let err = sigmoid(z) - y[r];
                for c in 0..ncols {
                    grad_w[c] += err * x[(r, c)];
                }
                grad_b += err;
            }
            for c in 0..ncols {
                weights[c] -=
                    params.learning_rate * (grad_w[c] * inv_n + params.l2 * weights[c]);
            }
            bias -= params.learning_rate * grad_b * inv_n;
        }

        LogisticRegression { weights, bias }
    }

    /// Positive-class probability per row.
    pub fn decision_function(&self, x: &Array2<f32>) -> Vec<f32> {
        (0..x.nrows())
            .map(|r| {
                let mut z = self.bias;
                for c in 0..x.ncols() {
                    z += self.weights[c] * x[(r, c)];
                }
                sigmoid(z)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Decision tree / random forest
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        ForestParams {
            n_trees: 25,
            max_depth: 6,
            min_leaf: 2,
            seed: 42,
        }
    }
}

/// One node in a flat tree array. `feature == -1` marks a leaf; `value` then
/// holds `[p0, p1]` class frequencies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub feature: i32,
    pub threshold: f32,
    pub left: i32,
    pub right: i32,
    pub value: Option<[f32; 2]>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn fit(
        x: &Array2<f32>,
        y: &[f32],
        indices: &[usize],
        params: &ForestParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut nodes = Vec::new();
        grow(x, y, indices, 0, params, rng, &mut nodes);
        DecisionTree { nodes }
    }

    /// Positive-class probability for one row.
    pub fn proba_row(&self, row: &[f32]) -> f32 {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            if node.feature < 0 {
                return node.value.map(|v| v[1]).unwrap_or(0.5);
            }
            let v = row.get(node.feature as usize).copied().unwrap_or(f32::NAN);
            // NaN goes left, like a value below the threshold.
            idx = if v.is_nan() || v <= node.threshold {
                node.left as usize
            } else {
                node.right as usize
            };
        }
    }
}

fn leaf(nodes: &mut Vec<TreeNode>, y: &[f32], indices: &[usize]) -> i32 {
    let n = indices.len().max(1) as f32;
    let pos = indices.iter().filter(|&&i| y[i] >= 0.5).count() as f32;
    nodes.push(TreeNode {
        feature: -1,
        threshold: 0.0,
        left: -1,
        right: -1,
        value: Some([1.0 - pos / n, pos / n]),
    });
    (nodes.len() - 1) as i32
}

fn gini(pos: f32, n: f32) -> f32 {
    if n <= 0.0 {
        return 0.0;
    }
    let p = pos / n;
    2.0 * p * (1.0 - p)
}

fn grow(
    x: &Array2<f32>,
    y: &[f32],
    indices: &[usize],
    depth: usize,
    params: &ForestParams,
    rng: &mut StdRng,
    nodes: &mut Vec<TreeNode>,
) -> i32 {
    let n = indices.len();
    let pos = indices.iter().filter(|&&i| y[i] >= 0.5).count();
    let pure = pos == 0 || pos == n;
    if depth >= params.max_depth || n < 2 * params.min_leaf || pure {
        return leaf(nodes, y, indices);
    }

    // Sample sqrt(d) candidate features per split.
    let d = x.ncols();
    let m = ((d as f32).sqrt().ceil() as usize).clamp(1, d);
    let candidates = rand::seq::index::sample(rng, d, m);

    let parent_impurity = gini(pos as f32, n as f32);
    let mut best: Option<(usize, f32, f32)> = None; // (feature, threshold, gain)

    for feature in candidates.iter() {
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_by(|&a, &b| {
            x[(a, feature)]
                .partial_cmp(&x[(b, feature)])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut left_n = 0f32;
        let mut left_pos = 0f32;
        let total_pos = pos as f32;
        for w in 0..n - 1 {
            let i = sorted[w];
            left_n += 1.0;
            if y[i] >= 0.5 {
                left_pos += 1.0;
            }
            let lo = x[(i, feature)];
            let hi = x[(sorted[w + 1], feature)];
            if hi <= lo {
                continue;
            }
            let right_n = n as f32 - left_n;
            if (left_n as usize) < params.min_leaf || (right_n as usize) < params.min_leaf {
                continue;
            }
            let weighted = (left_n * gini(left_pos, left_n)
                + right_n * gini(total_pos - left_pos, right_n))
                / n as f32;
            let gain = parent_impurity - weighted;
            if best.map(|(_, _, g)| gain > g).unwrap_or(gain > 1e-7) {
                best = Some((feature, (lo + hi) / 2.0, gain));
            }
        }
    }

    let Some((feature, threshold, _)) = best else {
        return leaf(nodes, y, indices);
    };

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| x[(i, feature)] <= threshold);

    let here = nodes.len();
    nodes.push(TreeNode {
        feature: feature as i32,
        threshold,
        left: -1,
        right: -1,
        value: None,
    });
    let left = grow(x, y, &left_idx, depth + 1, params, rng, nodes);
    let right = grow(x, y, &right_idx, depth + 1, params, rng, nodes);
    nodes[here].left = left;
    nodes[here].right = right;
    here as i32
}

/// Bagged CART trees; probability is the mean of per-tree leaf class
/// frequencies, as in the usual forest formulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_features: usize,
}

impl RandomForest {
    pub fn fit(x: &Array2<f32>, y: &[f32], params: &ForestParams) -> Self {
        let n = x.nrows();
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_trees);
        for _ in 0..params.n_trees {
            // Bootstrap sample with replacement.
            let indices: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            trees.push(DecisionTree::fit(x, y, &indices, params, &mut rng));
        }
        RandomForest {
            trees,
            n_features: x.ncols(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Positive-class probability per row, averaged across trees.
    pub fn decision_function(&self, x: &Array2<f32>) -> Vec<f32> {
        let inv = 1.0 / self.trees.len().max(1) as f32;
        (0..x.nrows())
            .map(|r| {
                let row: Vec<f32> = x.row(r).to_vec();
                self.trees.iter().map(|t| t.proba_row(&row)).sum::<f32>() * inv
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Multilayer perceptron (learned ensembler base model)
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MlpParams {
    pub hidden: usize,
    pub learning_rate: f32,
    pub epochs: usize,
    pub seed: u64,
}

impl Default for MlpParams {
    fn default() -> Self {
        MlpParams {
            hidden: 8,
            learning_rate: 0.3,
            epochs: 400,
            seed: 7,
        }
    }
}

/// One-hidden-layer perceptron with tanh hidden units and a sigmoid output,
/// trained full-batch on binary cross-entropy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MlpClassifier {
    w1: Vec<Vec<f32>>,
    b1: Vec<f32>,
    w2: Vec<f32>,
    b2: f32,
}

impl MlpClassifier {
    pub fn fit(x: &Array2<f32>, y: &[f32], params: &MlpParams) -> Self {
        let (nrows, ncols) = (x.nrows(), x.ncols());
        let hidden = params.hidden.max(1);
        let mut rng = StdRng::seed_from_u64(params.seed);
        let scale = 1.0 / (ncols.max(1) as f32).sqrt();

        let mut w1: Vec<Vec<f32>> = (0..hidden)
            .map(|_| (0..ncols).map(|_| rng.gen_range(-scale..scale)).collect())
            .collect();
        let mut b1 = vec![0.0f32; hidden];
        let mut w2: Vec<f32> = (0..hidden).map(|_| rng.gen_range(-0.5..0.5)).collect();
        let mut b2 = 0.0f32;

        let inv_n = 1.0 / nrows.max(1) as f32;
        let mut h = vec![0.0f32; hidden];

        for _ in 0..params.epochs {
            let mut g_w1 = vec![vec![0.0f32; ncols]; hidden];
            let mut g_b1 = vec![0.0f32; hidden];
            let mut g_w2 = vec![0.0f32; hidden];
            let mut g_b2 = 0.0f32;

            for r in 0..nrows {
                for j in 0..hidden {
                    let mut z = b1[j];
                    for c in 0..ncols {
                        z += w1[j][c] * x[(r, c)];
                    }
                    h[j] = z.tanh();
                }
                let mut z_out = b2;
                for j in 0..hidden {
                    z_out += w2[j] * h[j];
                }
                let dz = sigmoid(z_out) - y[r];

                for j in 0..hidden {
                    g_w2[j] += dz * h[j];
                    let dh = dz * w2[j] * (1.0 - h[j] * h[j]);
                    for c in 0..ncols {
                        g_w1[j][c] += dh * x[(r, c)];
                    }
                    g_b1[j] += dh;
                }
                g_b2 += dz;
            }

            let lr = params.learning_rate;
            for j in 0..hidden {
                for c in 0..ncols {
                    w1[j][c] -= lr * g_w1[j][c] * inv_n;
                }
                b1[j] -= lr * g_b1[j] * inv_n;
                w2[j] -= lr * g_w2[j] * inv_n;
            }
            b2 -= lr * g_b2 * inv_n;
        }

        MlpClassifier { w1, b1, w2, b2 }
    }

    /// Positive-class probability per row.
    pub fn decision_function(&self, x: &Array2<f32>) -> Vec<f32> {
        let hidden = self.w1.len();
        (0..x.nrows())
            .map(|r| {
                let mut z_out = self.b2;
                for j in 0..hidden {
                    let mut z = self.b1[j];
                    for c in 0..x.ncols() {
                        z += self.w1[j][c] * x[(r, c)];
                    }
                    z_out += self.w2[j] * z.tanh();
                }
                sigmoid(z_out)
            })
            .collect()
    }

    pub fn n_inputs(&self) -> usize {
        self.w1.first().map(|row| row.len()).unwrap_or(0)
    }
}
