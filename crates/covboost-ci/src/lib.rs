//! covboost CI - build/test and coverage collaborators
//!
//! - Executes Cargo stages (check, test, llvm-cov) with per-stage timeouts
//! - Chains them into a verification pipeline implementing
//!   [`covboost_core::BuildVerifier`]
//! - Measures workspace coverage through `cargo llvm-cov --json`

pub mod coverage;
pub mod pipeline;
pub mod runner;
pub mod stage;

pub use coverage::{CoverageProbe, MeasuredCoverage};
pub use pipeline::{tail_lines, PipelineResult, VerifyPipeline};
pub use runner::{CiRunner, StageResult};
pub use stage::{BuiltinStage, StageConfig};
