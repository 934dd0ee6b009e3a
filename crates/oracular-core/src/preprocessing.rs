//! Feature preprocessing shared by students and learned ensemblers.
//!
//! A `Scaler` standardizes each column to zero mean and unit variance; the
//! fitted parameters live in the owning modeler's stats so they survive
//! persist/load alongside the base model.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{OracleError, Result};
use crate::namespace::{Namespace, NsValue};

/// Per-column mean/std standard scaler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl Scaler {
    /// Minimum stddev to avoid division by zero when transforming.
    const MIN_STD: f32 = 1e-6;

    /// Fit a scaler from a matrix where rows are samples and columns are
    /// features.
    pub fn fit(x: &Array2<f32>) -> Result<Scaler> {
        let (nrows, ncols) = (x.nrows(), x.ncols());
        if nrows == 0 || ncols == 0 {
            return Err(OracleError::DimensionMismatch(
                "scaler requires a non-empty matrix".to_string(),
            ));
        }

        let mut mean = vec![0.0f32; ncols];
        for r in 0..nrows {
            for c in 0..ncols {
                mean[c] += x[(r, c)];
            }
        }
        let nrows_f = nrows as f32;
        for v in mean.iter_mut() {
            *v /= nrows_f;
        }

        let mut std = vec![0.0f32; ncols];
        for r in 0..nrows {
            for c in 0..ncols {
                let d = x[(r, c)] - mean[c];
                std[c] += d * d;
            }
        }
        for v in std.iter_mut() {
            *v = (*v / nrows_f).sqrt().max(Scaler::MIN_STD);
        }

        Ok(Scaler { mean, std })
    }

    /// Transform all rows, returning a new matrix.
    pub fn transform(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.mean.len() {
            return Err(OracleError::DimensionMismatch(format!(
                "scaler fitted on {} columns, input has {}",
                self.mean.len(),
                x.ncols()
            )));
        }
        let mut out = x.clone();
        for mut row in out.rows_mut() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = (*v - self.mean[c]) / self.std[c];
            }
        }
        Ok(out)
    }

    /// Record the fitted parameters under `<prefix>.mean` / `<prefix>.std`.
    pub fn store(&self, stats: &mut Namespace, prefix: &str) {
        stats.set(
            &format!("{}.mean", prefix),
            NsValue::float_list(self.mean.iter().map(|&v| v as f64)),
        );
        stats.set(
            &format!("{}.std", prefix),
            NsValue::float_list(self.std.iter().map(|&v| v as f64)),
        );
    }

    /// Rebuild a scaler previously recorded with [`Scaler::store`].
    pub fn from_stats(stats: &Namespace, prefix: &str) -> Result<Scaler> {
        let mean = stats
            .get_float_list(&format!("{}.mean", prefix))
            .ok_or_else(|| {
                OracleError::Config(format!("stats missing '{}.mean'", prefix))
            })?;
        let std = stats
            .get_float_list(&format!("{}.std", prefix))
            .ok_or_else(|| {
                OracleError::Config(format!("stats missing '{}.std'", prefix))
            })?;
        Ok(Scaler {
            mean: mean.into_iter().map(|v| v as f32).collect(),
            std: std.into_iter().map(|v| v as f32).collect(),
        })
    }
}
