//! The file chosen for improvement and the coverage snapshot taken with it.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::coverage::{FileCoverage, ProjectCoverage};

/// Output of the analyzer: created once per run, read by every later stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionRecord {
    /// Target file, exactly as named in the coverage dataset.
    pub path: PathBuf,

    /// Counters for the target at selection time.
    pub coverage: FileCoverage,

    /// `coverage.line_percent()` at selection time.
    pub coverage_percent: f64,

    /// 1-based position of the target in the ascending-coverage ranking.
    pub rank: usize,

    /// Number of eligible files considered (`n`).
    pub eligible_files: usize,

    /// Size of the worst-coverage window the target was drawn from (`k`).
    pub decile_size: usize,

    /// Project-wide coverage before any change.
    pub project_before: ProjectCoverage,

    pub selected_at: DateTime<Utc>,
}

impl SelectionRecord {
    /// Key used to look the target up in a coverage dataset.
    pub fn dataset_key(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}
