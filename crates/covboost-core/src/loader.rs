//! Coverage dataset loader for `cargo llvm-cov --json` exports.
//!
//! Only the per-file `summary` block is read; segment and branch data are
//! ignored. Files from every `data` element are merged into one dataset.

use serde::Deserialize;

use crate::domain::{CoverageDataset, CovboostError, FileCoverage, Result};

#[derive(Debug, Deserialize)]
struct LlvmCovExport {
    #[serde(default)]
    data: Vec<ExportData>,
}

#[derive(Debug, Deserialize)]
struct ExportData {
    #[serde(default)]
    files: Vec<ExportFile>,
}

#[derive(Debug, Deserialize)]
struct ExportFile {
    filename: String,
    #[serde(default)]
    summary: ExportSummary,
}

#[derive(Debug, Default, Deserialize)]
struct ExportSummary {
    #[serde(default)]
    lines: Counter,
    #[serde(default)]
    functions: Counter,
    #[serde(default)]
    regions: Counter,
}

#[derive(Debug, Default, Deserialize)]
struct Counter {
    #[serde(default)]
    count: u64,
    #[serde(default)]
    covered: u64,
}

/// Parse an llvm-cov JSON export into a dataset.
///
/// Malformed input is reported as [`CovboostError::NoCoverageData`]; an
/// export with no files yields an empty dataset.
pub fn parse_llvm_cov_json(raw: &str) -> Result<CoverageDataset> {
    let export: LlvmCovExport = serde_json::from_str(raw)
        .map_err(|e| CovboostError::NoCoverageData(format!("malformed coverage report: {}", e)))?;

    Ok(export
        .data
        .into_iter()
        .flat_map(|d| d.files)
        .map(|f| {
            let s = f.summary;
            (
                f.filename,
                FileCoverage {
                    lines_covered: s.lines.covered,
                    lines_total: s.lines.count,
                    functions_covered: s.functions.covered,
                    functions_total: s.functions.count,
                    regions_covered: s.regions.covered,
                    regions_total: s.regions.count,
                },
            )
        })
        .collect())
}
