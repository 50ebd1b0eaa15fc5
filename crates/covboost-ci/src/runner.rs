//! Stage execution.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use covboost_core::{CovboostError, Result};
use tokio::process::Command;
use tracing::debug;

use crate::stage::StageConfig;

/// Result of a stage execution.
#[derive(Debug, Clone)]
pub struct StageResult {
    pub stage_name: String,

    /// Exit code (0 = success, -1 = killed by signal or never ran).
    pub exit_code: i32,

    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub success: bool,
}

impl StageResult {
    /// Whether this stage passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }

    /// Result for a stage that could not be run to completion.
    pub fn aborted(stage_name: &str, error: &CovboostError, duration_ms: u64) -> Self {
        Self {
            stage_name: stage_name.to_string(),
            exit_code: -1,
            stdout: String::new(),
            stderr: error.to_string(),
            duration_ms,
            success: false,
        }
    }
}

/// Runs one stage as a child process.
pub struct CiRunner;

impl CiRunner {
    /// Execute `config` in `cwd` and capture its output.
    ///
    /// Spawn failures and timeouts are [`CovboostError::ExternalCall`]; a
    /// timed-out child is killed.
    pub async fn execute_stage(config: &StageConfig, cwd: &Path) -> Result<StageResult> {
        let start = Instant::now();

        let Some((exe, args)) = config.command.split_first() else {
            return Err(CovboostError::InvalidConfig(format!(
                "stage {} has empty command",
                config.name
            )));
        };

        debug!(
            stage = %config.name,
            command = ?config.command,
            cwd = %cwd.display(),
            "spawning stage"
        );
        let child = Command::new(exe)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CovboostError::external(&config.name, format!("failed to spawn {}: {}", exe, e))
            })?;

        let waited = if config.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(config.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| {
                CovboostError::external(
                    &config.name,
                    format!("timed out after {} seconds", config.timeout_secs),
                )
            })?
        } else {
            child.wait_with_output().await
        };
        let output = waited.map_err(|e| CovboostError::external(&config.name, e.to_string()))?;

        Ok(StageResult {
            stage_name: config.name.clone(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms: start.elapsed().as_millis() as u64,
            success: output.status.success(),
        })
    }
}
