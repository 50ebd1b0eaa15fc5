//! Per-file coverage statistics and the dataset they live in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Path fragments marking build output, vendored code and dependencies.
const EXCLUDED_DIRS: &[&str] = &["target/", ".cargo/", "vendor/"];

/// Line/function/region counters for one source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCoverage {
    pub lines_covered: u64,
    pub lines_total: u64,
    pub functions_covered: u64,
    pub functions_total: u64,
    pub regions_covered: u64,
    pub regions_total: u64,
}

impl FileCoverage {
    /// Line coverage as a percentage (`0.0` when the file has no lines).
    pub fn line_percent(&self) -> f64 {
        percent(self.lines_covered, self.lines_total)
    }

    /// Function coverage as a percentage (`0.0` when the file has no functions).
    pub fn function_percent(&self) -> f64 {
        percent(self.functions_covered, self.functions_total)
    }
}

fn percent(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64 * 100.0
    }
}

/// Whether a path names a project source file worth ranking.
///
/// Excludes non-Rust files, build/vendored/dependency directories and test
/// files (`/tests/` directories and `*_test.rs`).
pub fn is_eligible_source(path: &str) -> bool {
    if !path.ends_with(".rs") {
        return false;
    }
    if EXCLUDED_DIRS.iter().any(|dir| path.contains(dir)) {
        return false;
    }
    !(path.contains("/tests/") || path.ends_with("_test.rs"))
}

/// Mapping from file path to its coverage counters.
///
/// Iteration order is lexicographic by path, which makes every ranking over
/// the dataset deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageDataset {
    files: BTreeMap<String, FileCoverage>,
}

impl CoverageDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) the counters for `path`.
    pub fn insert(&mut self, path: impl Into<String>, coverage: FileCoverage) {
        self.files.insert(path.into(), coverage);
    }

    pub fn get(&self, path: &str) -> Option<&FileCoverage> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// All entries, eligible or not.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileCoverage)> {
        self.files.iter().map(|(path, cov)| (path.as_str(), cov))
    }

    /// Entries that pass [`is_eligible_source`] and have at least one line.
    pub fn eligible(&self) -> impl Iterator<Item = (&str, &FileCoverage)> {
        self.iter()
            .filter(|(path, cov)| cov.lines_total > 0 && is_eligible_source(path))
    }

    /// Project-wide summary over the eligible entries.
    pub fn project_summary(&self) -> ProjectCoverage {
        let (count, sum) = self
            .eligible()
            .fold((0usize, 0.0f64), |(n, sum), (_, cov)| {
                (n + 1, sum + cov.line_percent())
            });

        ProjectCoverage {
            file_count: count,
            average_coverage: if count == 0 { 0.0 } else { sum / count as f64 },
        }
    }
}

impl FromIterator<(String, FileCoverage)> for CoverageDataset {
    fn from_iter<I: IntoIterator<Item = (String, FileCoverage)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// Simple mean of per-file line coverage across eligible files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectCoverage {
    pub file_count: usize,
    pub average_coverage: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(covered: u64, total: u64) -> FileCoverage {
        FileCoverage {
            lines_covered: covered,
            lines_total: total,
            ..Default::default()
        }
    }

    #[test]
    fn test_line_percent() {
        assert_eq!(lines(50, 100).line_percent(), 50.0);
        assert_eq!(lines(0, 0).line_percent(), 0.0);
        assert_eq!(FileCoverage::default().function_percent(), 0.0);
    }

    #[test]
    fn test_eligibility_filter() {
        assert!(is_eligible_source("/repo/storage/src/cache/mod.rs"));
        assert!(!is_eligible_source("/repo/README.md"));
        assert!(!is_eligible_source("/repo/target/debug/build/out.rs"));
        assert!(!is_eligible_source("/home/u/.cargo/registry/src/serde/lib.rs"));
        assert!(!is_eligible_source("/repo/vendor/foo/src/lib.rs"));
        assert!(!is_eligible_source("/repo/builder/tests/smoke.rs"));
        assert!(!is_eligible_source("/repo/utils/src/crc32_test.rs"));
    }

    #[test]
    fn test_eligible_skips_empty_files() {
        let mut dataset = CoverageDataset::new();
        dataset.insert("/repo/src/a.rs", lines(1, 2));
        dataset.insert("/repo/src/empty.rs", lines(0, 0));
        assert_eq!(dataset.eligible().count(), 1);
    }

    #[test]
    fn test_project_summary_mean_of_percentages() {
        let mut dataset = CoverageDataset::new();
        dataset.insert("/repo/src/a.rs", lines(10, 100));
        dataset.insert("/repo/src/b.rs", lines(1, 2));
        dataset.insert("/repo/tests/it.rs", lines(0, 100));

        let summary = dataset.project_summary();
        assert_eq!(summary.file_count, 2);
        assert!((summary.average_coverage - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_project_summary_empty() {
        let summary = CoverageDataset::new().project_summary();
        assert_eq!(summary.file_count, 0);
        assert_eq!(summary.average_coverage, 0.0);
    }
}
