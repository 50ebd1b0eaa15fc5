//! Explicit per-run configuration threaded through every stage.

use std::path::{Path, PathBuf};
use std::time::Duration;

use uuid::Uuid;

use crate::artifacts::ArtifactStore;
use crate::domain::{CovboostError, Result};

/// Model used when none is configured.
pub const DEFAULT_MODEL_ID: &str = "gpt-4o-mini";

/// Validation attempts when none is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Upper bound on one generation call.
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 120;

/// Configuration shared by the analyze, generate, validate and report stages.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    /// Tags every log line of this run.
    pub run_id: Uuid,

    /// Root of the project being improved (build/test commands run here).
    pub workspace: PathBuf,

    /// Directory holding the inter-stage artifacts.
    pub output_dir: PathBuf,

    /// Maximum build/test invocations in one validation run.
    pub max_retries: u32,

    /// Generation model identifier.
    pub model_id: String,

    pub generation_timeout: Duration,
}

impl RunContext {
    pub fn new(workspace: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            workspace: workspace.into(),
            output_dir: output_dir.into(),
            max_retries: DEFAULT_MAX_RETRIES,
            model_id: DEFAULT_MODEL_ID.to_string(),
            generation_timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    /// Reject settings no stage can run with.
    pub fn check(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(CovboostError::InvalidConfig(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.model_id.trim().is_empty() {
            return Err(CovboostError::InvalidConfig(
                "model id must not be empty".to_string(),
            ));
        }
        if self.generation_timeout.is_zero() {
            return Err(CovboostError::InvalidConfig(
                "generation timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Artifact store rooted at `output_dir`.
    pub fn artifacts(&self) -> ArtifactStore {
        ArtifactStore::new(&self.output_dir)
    }

    /// Resolve a dataset path against the workspace (coverage exports
    /// normally carry absolute paths already).
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ctx = RunContext::new("/repo", "/tmp/out");
        assert_eq!(ctx.max_retries, 3);
        assert_eq!(ctx.model_id, "gpt-4o-mini");
        assert_eq!(ctx.generation_timeout, Duration::from_secs(120));
        assert!(ctx.check().is_ok());
    }

    #[test]
    fn test_zero_retries_rejected() {
        let ctx = RunContext::new("/repo", "/tmp/out").with_max_retries(0);
        assert!(matches!(ctx.check(), Err(CovboostError::InvalidConfig(_))));
    }

    #[test]
    fn test_resolve() {
        let ctx = RunContext::new("/repo", "/tmp/out");
        assert_eq!(ctx.resolve(Path::new("src/lib.rs")), PathBuf::from("/repo/src/lib.rs"));
        assert_eq!(ctx.resolve(Path::new("/abs/lib.rs")), PathBuf::from("/abs/lib.rs"));
    }
}
