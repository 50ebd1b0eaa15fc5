//! Candidates produced by the generation stage and their persisted metadata.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::digest::sha256_hex;
use super::error::{CovboostError, Result};

/// Original file content with freshly generated tests merged in.
///
/// Recreated on every generation, including every validator retry.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationArtifact {
    /// Full candidate file content.
    pub content: String,

    /// The test code exactly as extracted from the generator response.
    pub generated_tests: String,

    pub original_path: PathBuf,
    pub coverage_before: f64,
    pub model_id: String,

    /// 1-based generation counter within the run.
    pub generation: u32,
}

impl GenerationArtifact {
    /// SHA-256 of the candidate content.
    pub fn digest(&self) -> String {
        sha256_hex(self.content.as_bytes())
    }
}

/// Typed replacement for the free-form generation metadata record.
///
/// Required fields fail deserialization when absent; the validation fields
/// stay empty until the validator has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub original_path: PathBuf,
    pub candidate_path: PathBuf,
    pub coverage_before: f64,
    pub model_id: String,
    pub candidate_sha256: String,
    pub generated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_success: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_attempts: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
}

impl GenerationMetadata {
    /// Metadata for a freshly written candidate.
    pub fn for_candidate(artifact: &GenerationArtifact, candidate_path: PathBuf) -> Self {
        Self {
            original_path: artifact.original_path.clone(),
            candidate_path,
            coverage_before: artifact.coverage_before,
            model_id: artifact.model_id.clone(),
            candidate_sha256: artifact.digest(),
            generated_at: Utc::now(),
            validation_success: None,
            validation_attempts: None,
            validation_error: None,
        }
    }

    /// Semantic checks serde cannot express.
    pub fn check(&self, artifact: &str) -> Result<()> {
        if self.original_path.as_os_str().is_empty() {
            return Err(CovboostError::missing(artifact, "original_path is empty"));
        }
        if self.candidate_path.as_os_str().is_empty() {
            return Err(CovboostError::missing(artifact, "candidate_path is empty"));
        }
        if self.model_id.trim().is_empty() {
            return Err(CovboostError::missing(artifact, "model_id is empty"));
        }
        Ok(())
    }

    /// Validation result, required by the report stage.
    pub fn require_validation(&self, artifact: &str) -> Result<(bool, u32)> {
        match (self.validation_success, self.validation_attempts) {
            (Some(success), Some(attempts)) => Ok((success, attempts)),
            _ => Err(CovboostError::missing(
                artifact,
                "validation_success/validation_attempts not recorded; run validate first",
            )),
        }
    }
}
