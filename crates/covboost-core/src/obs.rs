//! Structured lifecycle events for a covboost run.
//!
//! Every event carries an `event` field so log pipelines can filter on it.
//! Wrap a run in [`RunSpan`] to tag all of its lines with the run id.

use std::fmt::Display;
use std::path::Path;

use tracing::{info, warn};

/// RAII guard that enters a run-scoped span for the lifetime of the guard.
///
/// ```ignore
/// let _span = RunSpan::enter(&ctx.run_id.to_string(), "validate");
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run_id: &str, stage: &str) -> Self {
        let span = tracing::info_span!("covboost.run", run_id = %run_id, stage = %stage);
        Self {
            _span: span.entered(),
        }
    }
}

/// Target chosen by the analyzer.
pub fn emit_selection_made(path: &str, percent: f64, rank: usize, decile: usize, eligible: usize) {
    info!(
        event = "selection.made",
        path = %path,
        coverage_percent = percent,
        rank = rank,
        decile_size = decile,
        eligible_files = eligible,
    );
}

pub fn emit_attempt_started(attempt: u32, max_retries: u32) {
    info!(
        event = "validation.attempt_started",
        attempt = attempt,
        max_retries = max_retries,
    );
}

pub fn emit_attempt_failed(attempt: u32, error: &dyn Display) {
    warn!(event = "validation.attempt_failed", attempt = attempt, error = %error);
}

pub fn emit_rolled_back(target: &Path, attempt: u32) {
    info!(
        event = "validation.rolled_back",
        target = %target.display(),
        attempt = attempt,
    );
}

pub fn emit_committed(target: &Path, attempt: u32, sha256: &str) {
    info!(
        event = "validation.committed",
        target = %target.display(),
        attempt = attempt,
        sha256 = %sha256,
    );
}

/// All attempts failed; the target holds its original content again.
pub fn emit_exhausted(target: &Path, attempts: u32, last_error: Option<&str>) {
    warn!(
        event = "validation.exhausted",
        target = %target.display(),
        attempts = attempts,
        last_error = last_error.unwrap_or(""),
    );
}

pub fn emit_report_rendered(target: &str, delta: Option<f64>, success: bool) {
    info!(
        event = "report.rendered",
        target = %target,
        delta = ?delta,
        success = success,
    );
}
