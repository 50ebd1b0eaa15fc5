//! Domain models for covboost.
//!
//! - `CoverageDataset` / `FileCoverage`: per-file coverage counters
//! - `SelectionRecord`: the chosen target and its before-snapshot
//! - `GenerationArtifact` / `GenerationMetadata`: candidates and their record
//! - `ValidationOutcome`: terminal result of the validation loop

pub mod coverage;
pub mod digest;
pub mod error;
pub mod generation;
pub mod selection;
pub mod validation;

pub use coverage::{is_eligible_source, CoverageDataset, FileCoverage, ProjectCoverage};
pub use digest::sha256_hex;
pub use error::{CovboostError, Result};
pub use generation::{GenerationArtifact, GenerationMetadata};
pub use selection::SelectionRecord;
pub use validation::{AttemptFailure, ValidationOutcome, ValidationState};
