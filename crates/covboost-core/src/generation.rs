//! Candidate generation: request building, response extraction and the
//! stage that turns generated tests into a [`GenerationArtifact`].
//!
//! The text-generation service itself sits behind [`TestGenerator`]; the
//! validator only sees [`CandidateSource`], so every retry can ask for a
//! freshly generated candidate.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artifacts::{self, ArtifactStore};
use crate::context::RunContext;
use crate::domain::{
    CovboostError, FileCoverage, GenerationArtifact, GenerationMetadata, Result, SelectionRecord,
};
use crate::integrator;

/// Sibling files sent along as context.
pub const MAX_SIBLINGS: usize = 4;

/// Per-sibling content cap in bytes.
pub const MAX_SIBLING_BYTES: usize = 16 * 1024;

/// A neighbouring source file from the target's directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiblingFile {
    pub path: PathBuf,
    pub content: String,
    pub truncated: bool,
}

/// Everything the generator needs to write tests for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub target_path: PathBuf,
    pub content: String,
    pub coverage: FileCoverage,
    pub coverage_percent: f64,
    pub siblings: Vec<SiblingFile>,
    pub model_id: String,
}

/// External text-generation collaborator.
#[async_trait]
pub trait TestGenerator: Send + Sync {
    /// Return the raw response text for `request`.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Source of fresh candidates for the validator.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Produce the `generation`-th candidate (1-based).
    async fn next_candidate(&self, generation: u32) -> Result<GenerationArtifact>;
}

fn fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[^\n`]*\r?\n(.*?)```").expect("valid regex"))
}

/// Extract test code from a generator response.
///
/// Returns the body of the first fenced code block, or the whole response
/// when it holds no complete fence. Leading blank lines and trailing
/// whitespace are dropped; indentation is kept.
pub fn extract_code_block(response: &str) -> String {
    match fence().captures(response).and_then(|c| c.get(1)) {
        Some(body) => body
            .as_str()
            .trim_start_matches(&['\n', '\r'][..])
            .trim_end()
            .to_string(),
        None => response.trim().to_string(),
    }
}

/// Other `.rs` files next to `target`, sorted by name and capped.
///
/// Files whose name mentions `test` are left out.
pub fn collect_siblings(target: &Path, max_files: usize, max_bytes: usize) -> Vec<SiblingFile> {
    let Some(dir) = target.parent() else {
        return Vec::new();
    };
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot list sibling files");
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "rs"))
        .filter(|p| p.file_name() != target.file_name())
        .filter(|p| !is_test_file_name(p))
        .collect();
    paths.sort();

    paths
        .into_iter()
        .filter_map(|path| match std::fs::read_to_string(&path) {
            Ok(content) => {
                let (content, truncated) = truncate_on_char_boundary(content, max_bytes);
                Some(SiblingFile {
                    path,
                    content,
                    truncated,
                })
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping unreadable sibling");
                None
            }
        })
        .take(max_files)
        .collect()
}

fn is_test_file_name(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().contains("test"))
}

fn truncate_on_char_boundary(mut content: String, max_bytes: usize) -> (String, bool) {
    if content.len() <= max_bytes {
        return (content, false);
    }
    let mut cut = max_bytes;
    while !content.is_char_boundary(cut) {
        cut -= 1;
    }
    content.truncate(cut);
    (content, true)
}

/// The generate-candidate stage.
///
/// Snapshots the target's original content once, so regenerating during
/// validation never depends on the on-disk state of the target.
pub struct GenerationStage {
    generator: Arc<dyn TestGenerator>,
    store: ArtifactStore,
    request: GenerationRequest,
    timeout: Duration,
}

impl GenerationStage {
    /// Read the target and its siblings and build the request template.
    pub fn prepare(
        ctx: &RunContext,
        selection: &SelectionRecord,
        generator: Arc<dyn TestGenerator>,
    ) -> Result<Self> {
        let target = ctx.resolve(&selection.path);
        let content =
            std::fs::read_to_string(&target).map_err(|e| CovboostError::io(&target, e))?;
        let siblings = collect_siblings(&target, MAX_SIBLINGS, MAX_SIBLING_BYTES);

        Ok(Self {
            generator,
            store: ctx.artifacts(),
            request: GenerationRequest {
                target_path: target,
                content,
                coverage: selection.coverage,
                coverage_percent: selection.coverage_percent,
                siblings,
                model_id: ctx.model_id.clone(),
            },
            timeout: ctx.generation_timeout,
        })
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    /// Original target content captured by [`GenerationStage::prepare`].
    pub fn original_content(&self) -> &str {
        &self.request.content
    }

    async fn call_generator(&self) -> Result<String> {
        let response = tokio::time::timeout(self.timeout, self.generator.generate(&self.request))
            .await
            .map_err(|_| {
                CovboostError::external(
                    "generator",
                    format!("timed out after {} seconds", self.timeout.as_secs()),
                )
            })??;

        let code = extract_code_block(&response);
        if code.is_empty() {
            return Err(CovboostError::external(
                "generator",
                "response contained no test code",
            ));
        }
        Ok(code)
    }
}

#[async_trait]
impl CandidateSource for GenerationStage {
    async fn next_candidate(&self, generation: u32) -> Result<GenerationArtifact> {
        info!(
            generation,
            target = %self.request.target_path.display(),
            model = %self.request.model_id,
            "requesting generated tests"
        );

        let generated_tests = self.call_generator().await?;
        let content = integrator::merge(&self.request.content, &generated_tests);

        let artifact = GenerationArtifact {
            content,
            generated_tests,
            original_path: self.request.target_path.clone(),
            coverage_before: self.request.coverage_percent,
            model_id: self.request.model_id.clone(),
            generation,
        };

        let candidate_path = self.store.write_text(artifacts::CANDIDATE, &artifact.content)?;
        let metadata = GenerationMetadata::for_candidate(&artifact, candidate_path);
        self.store.write_json(artifacts::GENERATION, &metadata)?;

        debug!(
            generation,
            sha256 = %metadata.candidate_sha256,
            "candidate written"
        );
        Ok(artifact)
    }
}
