//! Domain-level error taxonomy for covboost.

/// covboost domain errors.
///
/// Every stage fails fast with one of these kinds. Only
/// [`CovboostError::ValidationExhausted`] implies that the target file has
/// already been rolled back to its original bytes.
#[derive(Debug, thiserror::Error)]
pub enum CovboostError {
    #[error("no coverage data: {0}")]
    NoCoverageData(String),

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("external call failed ({collaborator}): {message}")]
    ExternalCall {
        collaborator: String,
        message: String,
    },

    #[error("validation exhausted after {attempts} attempt(s): {last_error}")]
    ValidationExhausted { attempts: u32, last_error: String },

    #[error("missing metadata in {artifact}: {reason}")]
    MissingMetadata { artifact: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CovboostError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        CovboostError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Failure reported by (or while calling) an external collaborator.
    pub fn external(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        CovboostError::ExternalCall {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }

    /// A prior stage's artifact is absent or malformed.
    pub fn missing(artifact: impl Into<String>, reason: impl Into<String>) -> Self {
        CovboostError::MissingMetadata {
            artifact: artifact.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for covboost domain operations.
pub type Result<T> = std::result::Result<T, CovboostError>;
