//! Error types for covboost-gen

use covboost_core::CovboostError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenError {
    /// No API token configured
    #[error("GITHUB_TOKEN is not set")]
    MissingToken,

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Endpoint answered with a non-success status
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Response had no choices or empty content
    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for GenError {
    fn from(err: reqwest::Error) -> Self {
        GenError::Http(err.to_string())
    }
}

impl From<GenError> for CovboostError {
    fn from(err: GenError) -> Self {
        CovboostError::external("generator", err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = GenError::Api {
            status: 429,
            body: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "API error 429: rate limited");
    }

    #[test]
    fn test_converts_to_external_call() {
        let err: CovboostError = GenError::EmptyResponse.into();
        match err {
            CovboostError::ExternalCall {
                collaborator,
                message,
            } => {
                assert_eq!(collaborator, "generator");
                assert_eq!(message, "model returned an empty response");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
