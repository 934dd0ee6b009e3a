//! Keyed records, the universal envelope for model inputs and outputs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{OracleError, Result};
use crate::frame::Frame;

/// Conventional key for the feature table.
pub const X: &str = "X";
/// Conventional key for labels.
pub const Y: &str = "y";
/// Conventional key for model output.
pub const PREDICTIONS: &str = "predictions";

pub const X_TRAIN: &str = "X_train";
pub const Y_TRAIN: &str = "y_train";
pub const X_TEST: &str = "X_test";
pub const Y_TEST: &str = "y_test";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Frame(Frame),
    Text(String),
    Number(f64),
    Flag(bool),
}

/// A mapping from string keys to values; all inter-component I/O uses
/// records.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    entries: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    pub fn with_frame(mut self, key: &str, frame: Frame) -> Self {
        self.entries.insert(key.to_string(), Value::Frame(frame));
        self
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.entries.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fetch a frame under `key`, failing with `UnsupportedInput` when the
    /// key is absent or holds a non-frame value.
    pub fn frame(&self, key: &str) -> Result<&Frame> {
        match self.entries.get(key) {
            Some(Value::Frame(frame)) => Ok(frame),
            Some(_) => Err(OracleError::UnsupportedInput(format!(
                "record key '{}' is not a frame",
                key
            ))),
            None => Err(OracleError::UnsupportedInput(format!(
                "record is missing key '{}'",
                key
            ))),
        }
    }

    /// Fetch a frame under `key` if present, validating its type.
    pub fn frame_opt(&self, key: &str) -> Result<Option<&Frame>> {
        match self.entries.get(key) {
            Some(Value::Frame(frame)) => Ok(Some(frame)),
            Some(_) => Err(OracleError::UnsupportedInput(format!(
                "record key '{}' is not a frame",
                key
            ))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_unsupported_input() {
        let record = Record::new();
        assert!(matches!(
            record.frame(X),
            Err(OracleError::UnsupportedInput(_))
        ));
    }

    #[test]
    fn wrong_container_is_unsupported_input() {
        let mut record = Record::new();
        record.insert(X, Value::Text("not a frame".to_string()));
        assert!(matches!(
            record.frame(X),
            Err(OracleError::UnsupportedInput(_))
        ));
    }

    #[test]
    fn frame_round_trip() {
        let frame = Frame::from_columns(vec![("a".to_string(), vec![1.0])]).unwrap();
        let record = Record::new().with_frame(X, frame.clone());
        assert_eq!(record.frame(X).unwrap(), &frame);
        assert!(record.frame_opt(Y).unwrap().is_none());
    }
}
