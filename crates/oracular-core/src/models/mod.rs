//! Model abstractions: the predictive-model contract, teacher models,
//! in-crate learners, students, and ensemblers.

pub mod ensembler;
pub mod learners;
pub mod student;
pub mod teacher;

use crate::error::{OracleError, Result};
use crate::record::Record;

/// The universal operation every node in the system implements.
///
/// `predict` consumes a record (conventionally keyed `X`) and returns a
/// record keyed `predictions`. Implementations never mutate themselves
/// during prediction, so a fully built model is safe to call concurrently.
pub trait Model {
    fn predict(&self, input: &Record) -> Result<Record>;

    /// Per-class probabilities, rows by classes. Optional; call
    /// [`Model::supports_proba`] first.
    fn predict_proba(&self, _input: &Record) -> Result<Record> {
        Err(OracleError::UnsupportedInput(format!(
            "{} does not implement predict_proba",
            self.name()
        )))
    }

    /// Whether `predict_proba` is available on this model.
    fn supports_proba(&self) -> bool {
        false
    }

    /// Human readable name for logs and errors.
    fn name(&self) -> &str {
        "model"
    }
}
