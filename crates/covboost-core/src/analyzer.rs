//! Target selection from a coverage dataset.
//!
//! Eligible files are ranked by ascending line coverage and the target is
//! drawn uniformly at random from the worst decile (`n / 10 + 1` files), so
//! near-tied files all get attention instead of the single worst file being
//! picked on every run.

use std::path::PathBuf;

use chrono::Utc;
use rand::Rng;
use tracing::debug;

use crate::domain::{CoverageDataset, CovboostError, FileCoverage, Result, SelectionRecord};
use crate::obs;

/// One eligible file in the coverage ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedFile {
    pub path: String,
    pub coverage: FileCoverage,
    pub percent: f64,
}

/// Number of files the target is drawn from, given `n` eligible files.
pub fn decile_size(n: usize) -> usize {
    n / 10 + 1
}

/// Eligible files sorted by ascending line coverage.
///
/// The sort is stable: files with equal coverage keep dataset order.
pub fn rank(dataset: &CoverageDataset) -> Vec<RankedFile> {
    let mut ranked: Vec<RankedFile> = dataset
        .eligible()
        .map(|(path, cov)| RankedFile {
            path: path.to_string(),
            coverage: *cov,
            percent: cov.line_percent(),
        })
        .collect();
    ranked.sort_by(|a, b| a.percent.total_cmp(&b.percent));
    ranked
}

/// Pick the file to improve.
///
/// Fails with [`CovboostError::NoCoverageData`] when no eligible file remains
/// after filtering.
pub fn select<R: Rng>(dataset: &CoverageDataset, rng: &mut R) -> Result<SelectionRecord> {
    let ranked = rank(dataset);
    if ranked.is_empty() {
        return Err(CovboostError::NoCoverageData(format!(
            "none of {} dataset entries is an eligible source file",
            dataset.len()
        )));
    }

    for (i, file) in ranked.iter().take(10).enumerate() {
        debug!(
            rank = i + 1,
            percent = %format!("{:.2}", file.percent),
            covered = file.coverage.lines_covered,
            total = file.coverage.lines_total,
            path = %file.path,
            "least covered"
        );
    }

    let n = ranked.len();
    let k = decile_size(n).min(n);
    let index = rng.random_range(0..k);
    let chosen = &ranked[index];

    obs::emit_selection_made(&chosen.path, chosen.percent, index + 1, k, n);

    Ok(SelectionRecord {
        path: PathBuf::from(&chosen.path),
        coverage: chosen.coverage,
        coverage_percent: chosen.percent,
        rank: index + 1,
        eligible_files: n,
        decile_size: k,
        project_before: dataset.project_summary(),
        selected_at: Utc::now(),
    })
}
