//! Binary classification metrics and decision-threshold tuning.

/// Precision, recall, and their harmonic mean for one binary label.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BinaryScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Compute precision/recall/f1 treating values >= 0.5 as the positive class.
///
/// # Arguments
///
/// * `predicted` - predicted 0/1 values (or scores already binarized)
/// * `truth` - ground-truth 0/1 values of the same length
pub fn binary_scores(predicted: &[f32], truth: &[f32]) -> BinaryScores {
    assert_eq!(
        predicted.len(),
        truth.len(),
        "predicted and truth must have equal lengths"
    );

    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (&p, &t) in predicted.iter().zip(truth.iter()) {
        let p = p >= 0.5;
        let t = t >= 0.5;
        match (p, t) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_ += 1,
            (false, false) => {}
        }
    }

    let precision = if tp + fp > 0 {
        tp as f64 / (tp + fp) as f64
    } else {
        0.0
    };
    let recall = if tp + fn_ > 0 {
        tp as f64 / (tp + fn_) as f64
    } else {
        0.0
    };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    BinaryScores {
        precision,
        recall,
        f1,
    }
}

/// Fraction of positions where both sides agree after binarization.
pub fn accuracy(predicted: &[f32], truth: &[f32]) -> f64 {
    assert_eq!(predicted.len(), truth.len());
    if predicted.is_empty() {
        return 0.0;
    }
    let agree = predicted
        .iter()
        .zip(truth.iter())
        .filter(|(&p, &t)| (p >= 0.5) == (t >= 0.5))
        .count();
    agree as f64 / predicted.len() as f64
}

/// The grid of candidate cutoffs scanned by [`tune_threshold`].
pub fn threshold_grid() -> Vec<f32> {
    (1..100).map(|i| i as f32 / 100.0).collect()
}

/// Choose the decision threshold that maximizes the harmonic mean of
/// precision and recall (f1) over a fixed grid of cutoffs.
///
/// Scores at or above the cutoff are labeled 1. Ties resolve toward the
/// lower cutoff, so no other grid point achieves a strictly higher f1.
///
/// # Returns
///
/// `(threshold, f1)` for the winning grid point.
pub fn tune_threshold(scores: &[f32], truth: &[f32]) -> (f32, f64) {
    assert_eq!(
        scores.len(),
        truth.len(),
        "scores and truth must have equal lengths"
    );

    let mut best_cut = 0.5f32;
    let mut best_f1 = -1.0f64;
    for cut in threshold_grid() {
        let predicted: Vec<f32> = scores
            .iter()
            .map(|&s| if s >= cut { 1.0 } else { 0.0 })
            .collect();
        let f1 = binary_scores(&predicted, truth).f1;
        if f1 > best_f1 {
            best_f1 = f1;
            best_cut = cut;
        }
    }
    (best_cut, best_f1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_prediction_scores_one() {
        let y = vec![1.0, 0.0, 1.0, 0.0];
        let s = binary_scores(&y, &y);
        assert_eq!(s.precision, 1.0);
        assert_eq!(s.recall, 1.0);
        assert_eq!(s.f1, 1.0);
    }

    #[test]
    fn no_positives_predicted_gives_zero_f1() {
        let predicted = vec![0.0, 0.0, 0.0];
        let truth = vec![1.0, 1.0, 0.0];
        let s = binary_scores(&predicted, &truth);
        assert_eq!(s.precision, 0.0);
        assert_eq!(s.recall, 0.0);
        assert_eq!(s.f1, 0.0);
    }

    #[test]
    fn tuned_threshold_is_grid_optimal() {
        // Positives concentrated above 0.7; one noisy negative at 0.75.
        let scores = vec![0.95, 0.9, 0.8, 0.75, 0.3, 0.2, 0.1, 0.72];
        let truth = vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        let (cut, best) = tune_threshold(&scores, &truth);

        // Property: no grid point beats the chosen one.
        for candidate in threshold_grid() {
            let predicted: Vec<f32> = scores
                .iter()
                .map(|&s| if s >= candidate { 1.0 } else { 0.0 })
                .collect();
            let f1 = binary_scores(&predicted, &truth).f1;
            assert!(
                f1 <= best + 1e-12,
                "cutoff {} has f1 {} above chosen {} ({})",
                candidate,
                f1,
                cut,
                best
            );
        }
    }

    #[test]
    fn ties_resolve_to_lower_cutoff() {
        // Any cutoff in (0.4, 0.6] separates perfectly; the first grid point
        // past 0.4 must win.
        let scores = vec![0.9, 0.8, 0.6, 0.4, 0.2, 0.1];
        let truth = vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0];
        let (cut, best) = tune_threshold(&scores, &truth);
        assert_eq!(best, 1.0);
        assert!((cut - 0.41).abs() < 1e-6, "expected 0.41, got {}", cut);
    }

    #[test]
    fn accuracy_counts_agreement() {
        let predicted = vec![1.0, 0.0, 1.0, 1.0];
        let truth = vec![1.0, 0.0, 0.0, 1.0];
        assert!((accuracy(&predicted, &truth) - 0.75).abs() < 1e-12);
    }
}
