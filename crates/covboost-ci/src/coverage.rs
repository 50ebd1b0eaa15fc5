//! Coverage measurement through `cargo llvm-cov`.

use std::path::{Path, PathBuf};

use covboost_core::{parse_llvm_cov_json, CoverageDataset, CovboostError, Result};
use tracing::info;

use crate::pipeline::{tail_lines, FAILURE_TAIL_LINES};
use crate::runner::CiRunner;
use crate::stage::{BuiltinStage, StageConfig};

/// A parsed coverage export together with its raw JSON, which is persisted
/// as an artifact.
#[derive(Debug, Clone)]
pub struct MeasuredCoverage {
    pub raw: String,
    pub dataset: CoverageDataset,
}

impl MeasuredCoverage {
    pub fn from_raw(raw: String) -> Result<Self> {
        let dataset = parse_llvm_cov_json(&raw)?;
        Ok(Self { raw, dataset })
    }

    /// Read an existing export instead of measuring. This is the only
    /// place coverage exports are read from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| CovboostError::io(path, e))?;
        Self::from_raw(raw)
    }
}

/// The coverage-measurement collaborator.
#[derive(Debug, Clone)]
pub struct CoverageProbe {
    workspace: PathBuf,
    stage: StageConfig,
}

impl CoverageProbe {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            stage: StageConfig::from_builtin(BuiltinStage::LlvmCov),
        }
    }

    /// Replace the measuring command; it must print an llvm-cov JSON export.
    pub fn with_stage(mut self, stage: StageConfig) -> Self {
        self.stage = stage;
        self
    }

    /// Run the coverage command and parse its stdout.
    pub async fn measure(&self) -> Result<MeasuredCoverage> {
        info!(
            stage = %self.stage.name,
            workspace = %self.workspace.display(),
            "Measuring coverage"
        );
        let result = CiRunner::execute_stage(&self.stage, &self.workspace).await?;
        if !result.passed() {
            return Err(CovboostError::external(
                &self.stage.name,
                format!(
                    "exited with code {}:\n{}",
                    result.exit_code,
                    tail_lines(&result.stderr, FAILURE_TAIL_LINES)
                ),
            ));
        }

        let measured = MeasuredCoverage::from_raw(result.stdout)?;
        info!(
            files = measured.dataset.len(),
            duration_ms = result.duration_ms,
            "Coverage measured"
        );
        Ok(measured)
    }

    /// Use `export` when given, otherwise measure.
    pub async fn measure_or_load(&self, export: Option<&Path>) -> Result<MeasuredCoverage> {
        match export {
            Some(path) => {
                info!(path = %path.display(), "Loading coverage export");
                MeasuredCoverage::load(path)
            }
            None => self.measure().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str =
        r#"{"data":[{"files":[{"filename":"/r/src/a.rs","summary":{"lines":{"count":4,"covered":1}}}]}]}"#;

    fn printing(script: &str) -> StageConfig {
        StageConfig::custom(
            "fake_cov".to_string(),
            vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            30,
        )
    }

    #[tokio::test]
    async fn test_measure_parses_stdout() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let probe =
            CoverageProbe::new(dir.path()).with_stage(printing(&format!("echo '{}'", EXPORT)));
        let measured = probe.measure().await.expect("measure");
        assert_eq!(measured.dataset.len(), 1);
        assert_eq!(measured.dataset.get("/r/src/a.rs").unwrap().lines_covered, 1);
    }

    #[tokio::test]
    async fn test_measure_failure_is_external_call() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let probe = CoverageProbe::new(dir.path())
            .with_stage(printing("echo 'no such command: llvm-cov' >&2; exit 101"));
        let err = probe.measure().await.unwrap_err();
        assert!(matches!(err, CovboostError::ExternalCall { .. }));
        assert!(err.to_string().contains("llvm-cov"));
    }

    #[tokio::test]
    async fn test_measure_garbage_is_no_coverage_data() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let probe = CoverageProbe::new(dir.path()).with_stage(printing("echo not-json"));
        assert!(matches!(
            probe.measure().await,
            Err(CovboostError::NoCoverageData(_))
        ));
    }

    #[tokio::test]
    async fn test_load_existing_export() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("cov.json");
        std::fs::write(&path, EXPORT).expect("write");

        let probe = CoverageProbe::new(dir.path()).with_stage(printing("exit 1"));
        let measured = probe.measure_or_load(Some(&path)).await.expect("load");
        assert_eq!(measured.raw, EXPORT);
        assert_eq!(measured.dataset.len(), 1);
        assert_eq!(MeasuredCoverage::load(&path).unwrap().dataset, measured.dataset);
    }

    #[test]
    fn test_load_missing_export_is_io_error() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let err = MeasuredCoverage::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, CovboostError::Io { .. }));
    }
}
