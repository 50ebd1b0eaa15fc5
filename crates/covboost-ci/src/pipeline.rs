//! Verification pipeline: the build/test collaborator of the validator.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use covboost_core::{BuildVerifier, Result, VerifyReport};
use tracing::{info, warn};

use crate::runner::{CiRunner, StageResult};
use crate::stage::{BuiltinStage, StageConfig};

/// Output lines kept in a failure summary.
pub const FAILURE_TAIL_LINES: usize = 40;

/// Result of one pipeline execution.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Whether at least one stage ran and every executed stage passed.
    pub success: bool,

    /// Executed stages, in order; ends at the first failure.
    pub stages: Vec<StageResult>,

    pub duration_ms: u64,
}

impl PipelineResult {
    pub fn passed_count(&self) -> usize {
        self.stages.iter().filter(|s| s.passed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.stages.iter().filter(|s| !s.passed()).count()
    }

    /// Summary of the failing stage, if any. A run with no executed stage
    /// verified nothing and counts as failed.
    pub fn failure_detail(&self) -> Option<String> {
        if self.stages.is_empty() {
            return Some("no enabled verification stage ran".to_string());
        }
        let failed = self.stages.iter().find(|s| !s.passed())?;
        let mut output = failed.stderr.clone();
        if !failed.stdout.trim().is_empty() {
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&failed.stdout);
        }
        Some(format!(
            "stage {} failed (exit code {}):\n{}",
            failed.stage_name,
            failed.exit_code,
            tail_lines(&output, FAILURE_TAIL_LINES)
        ))
    }
}

/// Last `n` lines of `text`.
pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

/// Ordered build/test stages run in the project workspace.
#[derive(Debug, Clone)]
pub struct VerifyPipeline {
    workspace: PathBuf,
    stages: Vec<StageConfig>,
}

impl VerifyPipeline {
    /// `cargo check` then `cargo test`.
    pub fn cargo(workspace: impl Into<PathBuf>) -> Self {
        Self::with_stages(
            workspace,
            vec![
                StageConfig::from_builtin(BuiltinStage::CargoCheck),
                StageConfig::from_builtin(BuiltinStage::CargoTest),
            ],
        )
    }

    pub fn with_stages(workspace: impl Into<PathBuf>, stages: Vec<StageConfig>) -> Self {
        Self {
            workspace: workspace.into(),
            stages,
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn stages(&self) -> &[StageConfig] {
        &self.stages
    }

    /// Run enabled stages in order, stopping at the first failure.
    ///
    /// A stage that cannot run (spawn error, timeout) is recorded as a
    /// failed stage with exit code -1.
    pub async fn run(&self) -> PipelineResult {
        let start = Instant::now();
        let mut results = Vec::new();

        for config in &self.stages {
            if !config.enabled {
                info!(stage = %config.name, "Skipping disabled stage");
                continue;
            }

            info!(stage = %config.name, "Executing stage");
            let stage_start = Instant::now();
            let result = match CiRunner::execute_stage(config, &self.workspace).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(stage = %config.name, error = %e, "stage execution error");
                    StageResult::aborted(&config.name, &e, stage_start.elapsed().as_millis() as u64)
                }
            };

            let passed = result.passed();
            info!(
                stage = %result.stage_name,
                exit_code = result.exit_code,
                duration_ms = result.duration_ms,
                passed,
                "Stage finished"
            );
            results.push(result);
            if !passed {
                break;
            }
        }

        if results.is_empty() {
            warn!(stages = self.stages.len(), "no enabled stage to run");
        }

        PipelineResult {
            success: !results.is_empty() && results.iter().all(StageResult::passed),
            stages: results,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

#[async_trait]
impl BuildVerifier for VerifyPipeline {
    async fn verify(&self) -> Result<VerifyReport> {
        let result = self.run().await;
        Ok(match result.failure_detail() {
            Some(detail) => VerifyReport::fail(detail),
            None => VerifyReport::pass(),
        })
    }
}
