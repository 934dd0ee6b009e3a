use std::error::Error;
use std::fmt;

/// Error type shared by every model, modeler, and store in the crate.
#[derive(Debug)]
pub enum OracleError {
    /// Missing or contradictory arguments to a modeler.
    Config(String),
    /// A record is missing a required key or carries the wrong container type.
    UnsupportedInput(String),
    /// A feature table is missing a column the model was fitted on.
    DimensionMismatch(String),
    /// Teacher output labels differ from what students/ensemblers expect.
    TeacherColumnMismatch(String),
    /// Oracle `predict` called before any students were built.
    NoStudentsBuilt,
    /// Oracle `predict` called before any ensemblers were built.
    NoEnsemblersBuilt,
    /// Artifact store lookup did not find the requested key.
    ArtifactMissing(String),
    /// A base model could not be serialized or deserialized.
    Serialization(String),
    /// Remote inference returned a failure.
    UpstreamService(String),
    Io(std::io::Error),
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleError::Config(msg) => write!(f, "config error: {}", msg),
            OracleError::UnsupportedInput(msg) => write!(f, "unsupported input: {}", msg),
            OracleError::DimensionMismatch(msg) => write!(f, "dimension mismatch: {}", msg),
            OracleError::TeacherColumnMismatch(msg) => {
                write!(f, "teacher column mismatch: {}", msg)
            }
            OracleError::NoStudentsBuilt => {
                write!(f, "oracle has no students; run the modeler first")
            }
            OracleError::NoEnsemblersBuilt => {
                write!(f, "oracle has no ensemblers; run the modeler first")
            }
            OracleError::ArtifactMissing(key) => write!(f, "artifact not found: {}", key),
            OracleError::Serialization(msg) => write!(f, "serialization error: {}", msg),
            OracleError::UpstreamService(msg) => write!(f, "upstream service error: {}", msg),
            OracleError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl Error for OracleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            OracleError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OracleError {
    fn from(err: std::io::Error) -> Self {
        OracleError::Io(err)
    }
}

impl From<serde_json::Error> for OracleError {
    fn from(err: serde_json::Error) -> Self {
        OracleError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for OracleError {
    fn from(err: serde_yaml::Error) -> Self {
        OracleError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OracleError>;
