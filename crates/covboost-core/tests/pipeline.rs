//! End-to-end run of the stages with in-memory collaborators.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use covboost_core::artifacts::{self, ArtifactStore};
use covboost_core::{
    parse_llvm_cov_json, render_markdown, report, select, write_report, BuildVerifier,
    CandidateSource, CovboostError, GenerationMetadata, GenerationRequest, GenerationStage,
    Result, RunContext, TestGenerator, Validator, VerifyReport,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

const LIB: &str = "\
pub fn clamp(v: i32, lo: i32, hi: i32) -> i32 {
    v.max(lo).min(hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_low() {
        assert_eq!(clamp(-5, 0, 10), 0);
    }
}
";

struct FencedGenerator {
    requests: Mutex<Vec<GenerationRequest>>,
}

#[async_trait]
impl TestGenerator for FencedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        Ok("Sure:\n```rust\n    #[test]\n    fn test_clamp_high() {\n        assert_eq!(clamp(50, 0, 10), 10);\n    }\n```\n".to_string())
    }
}

struct SlowGenerator;

#[async_trait]
impl TestGenerator for SlowGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok("```rust\nfn late() {}\n```".to_string())
    }
}

struct EmptyGenerator;

#[async_trait]
impl TestGenerator for EmptyGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        Ok("```rust\n```".to_string())
    }
}

struct AlwaysPass;

#[async_trait]
impl BuildVerifier for AlwaysPass {
    async fn verify(&self) -> Result<VerifyReport> {
        Ok(VerifyReport::pass())
    }
}

fn export(entries: &[(&Path, u64, u64)]) -> String {
    let files: Vec<serde_json::Value> = entries
        .iter()
        .map(|(path, covered, count)| {
            serde_json::json!({
                "filename": path.to_string_lossy(),
                "summary": {
                    "lines": {"count": count, "covered": covered},
                    "functions": {"count": 2, "covered": 1},
                    "regions": {"count": 4, "covered": 2}
                }
            })
        })
        .collect();
    serde_json::json!({"data": [{"files": files}]}).to_string()
}

fn workspace() -> (TempDir, RunContext) {
    let dir = TempDir::new().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/lib.rs"), LIB).unwrap();
    std::fs::write(dir.path().join("src/util.rs"), "pub fn noop() {}\n").unwrap();
    let ctx = RunContext::new(dir.path(), dir.path().join("out"));
    (dir, ctx)
}

#[tokio::test]
async fn analyze_generate_validate_report() {
    let (dir, ctx) = workspace();
    let lib = dir.path().join("src/lib.rs");
    let util = dir.path().join("src/util.rs");
    let store = ctx.artifacts();

    let before = parse_llvm_cov_json(&export(&[(&lib, 2, 4), (&util, 1, 1)])).unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let selection = select(&before, &mut rng).expect("select");
    assert_eq!(selection.path, lib);
    store.write_json(artifacts::SELECTION, &selection).unwrap();

    let generator = Arc::new(FencedGenerator {
        requests: Mutex::new(Vec::new()),
    });
    let stage = GenerationStage::prepare(&ctx, &store.load_selection().unwrap(), generator.clone())
        .expect("prepare");
    let initial = stage.next_candidate(1).await.expect("generate");

    let request = generator.requests.lock().unwrap()[0].clone();
    assert_eq!(request.content, LIB);
    assert_eq!(request.siblings.len(), 1);
    assert!(initial.content.starts_with("pub fn clamp"));
    assert!(initial.content.contains("fn test_clamp_high()"));
    assert_eq!(initial.content.matches("#[cfg(test)]").count(), 1);

    let meta: GenerationMetadata = store.load_generation().unwrap();
    assert_eq!(meta.candidate_sha256, initial.digest());

    let mut validator = Validator::new(&lib, ctx.max_retries, &stage, &AlwaysPass)
        .with_initial_candidate(initial.clone());
    let outcome = validator.validate().await.expect("validate");
    assert!(outcome.success);
    assert_eq!(std::fs::read_to_string(&lib).unwrap(), initial.content);

    let after = parse_llvm_cov_json(&export(&[(&lib, 4, 4), (&util, 1, 1)])).unwrap();
    let summary = report(&selection, &after, &outcome, &ctx.model_id);
    assert_eq!(summary.lines_covered_delta(), Some(2));

    let (md, _) = write_report(&store, &summary).unwrap();
    let rendered = std::fs::read_to_string(md).unwrap();
    assert_eq!(rendered, render_markdown(&summary));
    assert!(rendered.contains("| **Coverage Percentage** | 50.00% | 100.00% | **+50.00%** |"));
    assert!(rendered.contains("| **Average Coverage** | 75.00% | 100.00% | **+25.00%** |"));
}

#[tokio::test(start_paused = true)]
async fn generation_timeout_is_an_external_call_failure() {
    let (dir, ctx) = workspace();
    let ctx = ctx.with_generation_timeout(Duration::from_secs(1));
    let lib = dir.path().join("src/lib.rs");
    let before = parse_llvm_cov_json(&export(&[(&lib, 0, 4)])).unwrap();
    let selection = select(&before, &mut StdRng::seed_from_u64(1)).unwrap();

    let stage = GenerationStage::prepare(&ctx, &selection, Arc::new(SlowGenerator)).unwrap();
    let err = stage.next_candidate(1).await.unwrap_err();
    assert!(matches!(err, CovboostError::ExternalCall { .. }));
    assert!(!ArtifactStore::new(&ctx.output_dir).path(artifacts::CANDIDATE).exists());
}

#[tokio::test]
async fn empty_generated_code_is_rejected() {
    let (dir, ctx) = workspace();
    let lib = dir.path().join("src/lib.rs");
    let before = parse_llvm_cov_json(&export(&[(&lib, 0, 4)])).unwrap();
    let selection = select(&before, &mut StdRng::seed_from_u64(1)).unwrap();

    let stage = GenerationStage::prepare(&ctx, &selection, Arc::new(EmptyGenerator)).unwrap();
    let err = stage.next_candidate(1).await.unwrap_err();
    assert!(err.to_string().contains("no test code"));
}

#[test]
fn report_stage_needs_validation_result() {
    let dir = TempDir::new().unwrap();
    let store = ArtifactStore::new(dir.path());
    assert!(matches!(
        store.load_generation(),
        Err(CovboostError::MissingMetadata { .. })
    ));
}
