//! Before/after coverage comparison and the Markdown report.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::artifacts::{self, ArtifactStore};
use crate::domain::{
    CoverageDataset, FileCoverage, ProjectCoverage, Result, SelectionRecord, ValidationOutcome,
};
use crate::obs;

/// Final summary of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub target: String,
    pub file_before: FileCoverage,
    /// Equal to `file_before` when `measured` is false.
    pub file_after: FileCoverage,
    /// Whether the after dataset contained the target.
    pub measured: bool,
    pub project_before: ProjectCoverage,
    pub project_after: ProjectCoverage,
    pub validation_attempts: u32,
    pub validation_success: bool,
    pub model_id: String,
}

impl CoverageReport {
    /// Line coverage change in percentage points; `None` when unmeasured.
    pub fn line_percent_delta(&self) -> Option<f64> {
        self.measured
            .then(|| self.file_after.line_percent() - self.file_before.line_percent())
    }

    pub fn lines_covered_delta(&self) -> Option<i64> {
        self.measured
            .then(|| self.file_after.lines_covered as i64 - self.file_before.lines_covered as i64)
    }

    pub fn functions_covered_delta(&self) -> Option<i64> {
        self.measured.then(|| {
            self.file_after.functions_covered as i64 - self.file_before.functions_covered as i64
        })
    }

    pub fn project_delta(&self) -> f64 {
        self.project_after.average_coverage - self.project_before.average_coverage
    }
}

/// Compare the selection snapshot against the post-validation dataset.
///
/// A target missing from `after` does not fail the report: the before
/// figures are reused and the file deltas are marked unmeasured.
pub fn report(
    before: &SelectionRecord,
    after: &CoverageDataset,
    outcome: &ValidationOutcome,
    model_id: &str,
) -> CoverageReport {
    let target = before.dataset_key();
    let (file_after, measured) = match after.get(&target) {
        Some(cov) => (*cov, true),
        None => {
            warn!(target = %target, "target missing from post-validation coverage");
            (before.coverage, false)
        }
    };

    CoverageReport {
        target,
        file_before: before.coverage,
        file_after,
        measured,
        project_before: before.project_before,
        project_after: after.project_summary(),
        validation_attempts: outcome.attempts,
        validation_success: outcome.success,
        model_id: model_id.to_string(),
    }
}

fn signed_percent(delta: f64) -> String {
    // Avoid rendering "-0.00%".
    let rounded = (delta * 100.0).round() / 100.0;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{:+.2}%", rounded)
}

fn delta_cell<T>(delta: Option<T>, fmt: impl Fn(T) -> String) -> String {
    match delta {
        Some(d) => format!("**{}**", fmt(d)),
        None => "unmeasured".to_string(),
    }
}

fn ratio(covered: u64, total: u64) -> String {
    format!("{}/{}", covered, total)
}

/// Render the report as Markdown. Output depends only on `report`.
pub fn render_markdown(report: &CoverageReport) -> String {
    let before = &report.file_before;
    let after = &report.file_after;
    let mut out = String::new();

    out.push_str("# Coverage Improvement Report\n\n");
    out.push_str("## Target File\n\n");
    out.push_str(&format!("**File:** `{}`\n\n", report.target));

    out.push_str("## File Coverage\n\n");
    out.push_str("| Metric | Before | After | Change |\n");
    out.push_str("|--------|--------|-------|--------|\n");
    out.push_str(&format!(
        "| **Coverage Percentage** | {:.2}% | {:.2}% | {} |\n",
        before.line_percent(),
        after.line_percent(),
        delta_cell(report.line_percent_delta(), signed_percent)
    ));
    out.push_str(&format!(
        "| **Lines Covered** | {} | {} | {} |\n",
        ratio(before.lines_covered, before.lines_total),
        ratio(after.lines_covered, after.lines_total),
        delta_cell(report.lines_covered_delta(), |d| format!("{:+}", d))
    ));
    out.push_str(&format!(
        "| **Functions Covered** | {} | {} | {} |\n\n",
        ratio(before.functions_covered, before.functions_total),
        ratio(after.functions_covered, after.functions_total),
        delta_cell(report.functions_covered_delta(), |d| format!("{:+}", d))
    ));

    out.push_str("## Project Coverage\n\n");
    out.push_str("| Metric | Before | After | Change |\n");
    out.push_str("|--------|--------|-------|--------|\n");
    out.push_str(&format!(
        "| **Average Coverage** | {:.2}% | {:.2}% | **{}** |\n",
        report.project_before.average_coverage,
        report.project_after.average_coverage,
        signed_percent(report.project_delta())
    ));
    out.push_str(&format!(
        "| **Files Analysed** | {} | {} | {:+} |\n\n",
        report.project_before.file_count,
        report.project_after.file_count,
        report.project_after.file_count as i64 - report.project_before.file_count as i64
    ));

    out.push_str("## Details\n\n");
    out.push_str(&format!(
        "- **Validation Attempts:** {}\n",
        report.validation_attempts
    ));
    out.push_str(&format!(
        "- **Validation Status:** {}\n",
        if report.validation_success {
            "Success"
        } else {
            "Failed"
        }
    ));
    out.push_str(&format!("- **Generation Model:** {}\n", report.model_id));
    out.push_str(&format!(
        "- **Target Measured After Validation:** {}\n\n",
        if report.measured { "yes" } else { "no" }
    ));

    out.push_str("## Review Checklist\n\n");
    out.push_str("These tests were generated automatically. Before merging, check that they:\n");
    out.push_str("- follow the project's coding standards\n");
    out.push_str("- exercise meaningful behaviour rather than restating the code\n");
    out.push_str("- are maintainable and deterministic\n");
    out
}

/// Write `coverage_report.md` and `coverage_stats.json`.
pub fn write_report(store: &ArtifactStore, report: &CoverageReport) -> Result<(PathBuf, PathBuf)> {
    let md = store.write_text(artifacts::REPORT_MD, &render_markdown(report))?;
    let json = store.write_json(artifacts::REPORT_JSON, report)?;
    obs::emit_report_rendered(&report.target, report.line_percent_delta(), report.validation_success);
    Ok((md, json))
}
