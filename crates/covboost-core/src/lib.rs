//! covboost core library
//!
//! Selects an under-tested source file from a coverage export, merges
//! generated tests into it, validates the candidate transactionally against
//! the project's build and test suite, and reports the coverage change.
//!
//! External collaborators (text generation, build/test execution) sit behind
//! the [`TestGenerator`] and [`BuildVerifier`] traits.

pub mod analyzer;
pub mod artifacts;
pub mod context;
pub mod domain;
pub mod generation;
pub mod integrator;
pub mod loader;
pub mod obs;
pub mod reporter;
pub mod telemetry;
pub mod validator;

pub use analyzer::{decile_size, rank, select, RankedFile};
pub use artifacts::ArtifactStore;
pub use context::RunContext;
pub use domain::{
    is_eligible_source, sha256_hex, AttemptFailure, CoverageDataset, CovboostError, FileCoverage,
    GenerationArtifact, GenerationMetadata, ProjectCoverage, Result, SelectionRecord,
    ValidationOutcome, ValidationState,
};
pub use generation::{
    extract_code_block, CandidateSource, GenerationRequest, GenerationStage, SiblingFile,
    TestGenerator,
};
pub use integrator::merge;
pub use loader::parse_llvm_cov_json;
pub use obs::RunSpan;
pub use reporter::{render_markdown, report, write_report, CoverageReport};
pub use telemetry::init_tracing;
pub use validator::{write_atomic, BuildVerifier, FileBackup, Validator, VerifyReport};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
