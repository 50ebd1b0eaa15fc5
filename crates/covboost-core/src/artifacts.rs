//! Inter-stage artifacts persisted in the shared output directory.
//!
//! Each stage reads the previous stage's JSON artifact through
//! [`ArtifactStore`]; an absent, unparsable or incomplete artifact is a
//! [`CovboostError::MissingMetadata`] naming the file.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::{
    sha256_hex, CovboostError, GenerationArtifact, GenerationMetadata, Result, SelectionRecord,
};

/// Raw coverage export used for selection.
pub const COVERAGE_BEFORE: &str = "coverage_before.json";
/// Selection record written by `analyze`.
pub const SELECTION: &str = "selection.json";
/// Latest candidate file content.
pub const CANDIDATE: &str = "candidate.rs";
/// Generation metadata, updated by `validate`.
pub const GENERATION: &str = "generation.json";
/// Raw coverage export after validation.
pub const COVERAGE_AFTER: &str = "coverage_after.json";
/// Rendered Markdown report.
pub const REPORT_MD: &str = "coverage_report.md";
/// Machine-readable report.
pub const REPORT_JSON: &str = "coverage_stats.json";

/// Reader/writer for the artifact directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Create the directory if needed.
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| CovboostError::io(&self.dir, e))
    }

    pub fn write_text(&self, name: &str, text: &str) -> Result<PathBuf> {
        self.ensure()?;
        let path = self.path(name);
        std::fs::write(&path, text).map_err(|e| CovboostError::io(&path, e))?;
        Ok(path)
    }

    pub fn read_text(&self, name: &str) -> Result<String> {
        let path = self.path(name);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CovboostError::missing(
                name,
                format!("{} not found; run the previous stage first", path.display()),
            )),
            Err(e) => Err(CovboostError::io(&path, e)),
        }
    }

    /// Write `value` as pretty JSON.
    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(value)?;
        self.write_text(name, &json)
    }

    /// Read and parse a JSON artifact; parse failures name the missing field.
    pub fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let raw = self.read_text(name)?;
        serde_json::from_str(&raw).map_err(|e| CovboostError::missing(name, e.to_string()))
    }

    pub fn load_selection(&self) -> Result<SelectionRecord> {
        self.read_json(SELECTION)
    }

    pub fn load_generation(&self) -> Result<GenerationMetadata> {
        let meta: GenerationMetadata = self.read_json(GENERATION)?;
        meta.check(GENERATION)?;
        Ok(meta)
    }

    /// The candidate written by `generate`, checked against its recorded digest.
    pub fn load_candidate(&self) -> Result<(GenerationMetadata, GenerationArtifact)> {
        let meta = self.load_generation()?;
        let content = self.read_text(CANDIDATE)?;
        let digest = sha256_hex(content.as_bytes());
        if digest != meta.candidate_sha256 {
            return Err(CovboostError::missing(
                CANDIDATE,
                format!(
                    "digest {} does not match {} recorded in {}",
                    digest, meta.candidate_sha256, GENERATION
                ),
            ));
        }

        let artifact = GenerationArtifact {
            content,
            generated_tests: String::new(),
            original_path: meta.original_path.clone(),
            coverage_before: meta.coverage_before,
            model_id: meta.model_id.clone(),
            generation: 1,
        };
        Ok((meta, artifact))
    }
}
