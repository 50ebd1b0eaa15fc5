//! Transactional, bounded-retry validation of generated candidates.
//!
//! The target file is owned by the validator for the whole run:
//! - a full-content backup (`<target>.backup`) is taken on entry
//! - each attempt writes one candidate atomically and runs the build/test
//!   collaborator once
//! - a failed attempt restores the original bytes before a fresh candidate
//!   is requested
//! - on exhaustion the original is restored and the backup released
//!
//! The target therefore ends up either byte-identical to its original or
//! holding exactly one committed candidate. If the process dies mid-attempt
//! the backup stays on disk and the next run refuses to start until it has
//! been dealt with.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{
    sha256_hex, AttemptFailure, CovboostError, GenerationArtifact, Result, ValidationOutcome,
    ValidationState,
};
use crate::generation::CandidateSource;
use crate::obs;

/// Verdict of one build/test invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub passed: bool,
    /// Failure summary (empty on success).
    pub detail: String,
}

impl VerifyReport {
    pub fn pass() -> Self {
        Self {
            passed: true,
            detail: String::new(),
        }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            passed: false,
            detail: detail.into(),
        }
    }
}

/// External build/test collaborator.
///
/// An `Err` (spawn failure, timeout) is treated exactly like a failing report.
#[async_trait]
pub trait BuildVerifier: Send + Sync {
    async fn verify(&self) -> Result<VerifyReport>;
}

// ---------------------------------------------------------------------------
// Backup
// ---------------------------------------------------------------------------

/// Full-content backup of the target, released only at a terminal state.
///
/// Dropping an unreleased backup (an error or panic path) restores the
/// original and then removes the backup; if that restore fails the backup
/// is left on disk for manual recovery.
#[derive(Debug)]
pub struct FileBackup {
    target: PathBuf,
    backup: PathBuf,
    original_sha256: String,
    released: bool,
}

impl FileBackup {
    /// `<target>.backup`
    pub fn backup_path(target: &Path) -> PathBuf {
        let mut name: OsString = target.file_name().map(OsString::from).unwrap_or_default();
        name.push(".backup");
        target.with_file_name(name)
    }

    /// Copy `target` aside. Refuses to overwrite a backup left by an
    /// interrupted run.
    pub fn take(target: &Path) -> Result<Self> {
        let backup = Self::backup_path(target);
        if backup.exists() {
            return Err(CovboostError::io(
                &backup,
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "backup from an interrupted run exists; restore or delete it first",
                ),
            ));
        }

        let bytes = std::fs::read(target).map_err(|e| CovboostError::io(target, e))?;
        std::fs::copy(target, &backup).map_err(|e| CovboostError::io(&backup, e))?;
        debug!(backup = %backup.display(), "backup taken");

        Ok(Self {
            target: target.to_path_buf(),
            backup,
            original_sha256: sha256_hex(&bytes),
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.backup
    }

    pub fn original_sha256(&self) -> &str {
        &self.original_sha256
    }

    /// Put the original bytes back. Idempotent.
    pub fn restore(&self) -> Result<()> {
        let bytes = std::fs::read(&self.backup).map_err(|e| CovboostError::io(&self.backup, e))?;
        let digest = sha256_hex(&bytes);
        if digest != self.original_sha256 {
            return Err(CovboostError::io(
                &self.backup,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!(
                        "backup digest {} does not match original {}",
                        digest, self.original_sha256
                    ),
                ),
            ));
        }
        write_atomic(&self.target, &bytes)
    }

    /// Delete the backup; the target keeps whatever it holds now.
    pub fn release(mut self) {
        self.released = true;
        if let Err(e) = std::fs::remove_file(&self.backup) {
            warn!(backup = %self.backup.display(), error = %e, "failed to remove backup");
        }
    }
}

impl Drop for FileBackup {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match self.restore() {
            Ok(()) => {
                let _ = std::fs::remove_file(&self.backup);
            }
            Err(e) => warn!(
                backup = %self.backup.display(),
                error = %e,
                "restore on abort failed; backup kept for manual recovery"
            ),
        }
    }
}

/// Replace `path` with `bytes` via a sibling temp file and rename, keeping
/// the existing file's permissions.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| CovboostError::io(dir, e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| CovboostError::io(tmp.path(), e))?;
    if let Ok(meta) = std::fs::metadata(path) {
        std::fs::set_permissions(tmp.path(), meta.permissions())
            .map_err(|e| CovboostError::io(tmp.path(), e))?;
    }
    tmp.persist(path)
        .map_err(|e| CovboostError::io(path, e.error))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Bounded, transactional retry loop around build/test verification.
pub struct Validator<'a> {
    target: PathBuf,
    max_retries: u32,
    source: &'a dyn CandidateSource,
    verifier: &'a dyn BuildVerifier,
    initial: Option<GenerationArtifact>,
    state: ValidationState,
    invocations: u32,
}

impl<'a> Validator<'a> {
    pub fn new(
        target: impl Into<PathBuf>,
        max_retries: u32,
        source: &'a dyn CandidateSource,
        verifier: &'a dyn BuildVerifier,
    ) -> Self {
        Self {
            target: target.into(),
            max_retries,
            source,
            verifier,
            initial: None,
            state: ValidationState::Init,
            invocations: 0,
        }
    }

    /// Use an already generated candidate for the first attempt instead of
    /// asking the source.
    pub fn with_initial_candidate(mut self, candidate: GenerationArtifact) -> Self {
        self.initial = Some(candidate);
        self
    }

    pub fn state(&self) -> ValidationState {
        self.state
    }

    /// Build/test invocations performed so far.
    pub fn invocations(&self) -> u32 {
        self.invocations
    }

    fn transition(&mut self, next: ValidationState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal validator transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = ?self.state, to = ?next, "validator transition");
        self.state = next;
    }

    /// Run the loop to a terminal state.
    ///
    /// Returns `Ok` with `success == false` after exhaustion (the target has
    /// been restored by then). `Err` means the loop could not run or an I/O
    /// failure interrupted it; the backup guard restores the target on the
    /// way out.
    pub async fn validate(&mut self) -> Result<ValidationOutcome> {
        if self.max_retries == 0 {
            return Err(CovboostError::InvalidConfig(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.state != ValidationState::Init {
            return Err(CovboostError::InvalidConfig(format!(
                "validator already ran (state {:?})",
                self.state
            )));
        }

        let backup = FileBackup::take(&self.target)?;
        let mut pending = self.initial.take();
        let mut failures: Vec<AttemptFailure> = Vec::new();

        for attempt in 1..=self.max_retries {
            self.transition(ValidationState::Attempting);
            obs::emit_attempt_started(attempt, self.max_retries);

            let candidate = match pending.take() {
                Some(candidate) => candidate,
                None => match self.source.next_candidate(attempt).await {
                    Ok(candidate) => candidate,
                    Err(e) => {
                        // Target was never touched in this attempt.
                        obs::emit_attempt_failed(attempt, &e);
                        failures.push(AttemptFailure {
                            attempt,
                            error: e.to_string(),
                        });
                        self.transition(ValidationState::RolledBack);
                        continue;
                    }
                },
            };

            write_atomic(&self.target, candidate.content.as_bytes())?;
            self.invocations += 1;

            let error = match self.verifier.verify().await {
                Ok(report) if report.passed => {
                    self.transition(ValidationState::Committed);
                    backup.release();
                    let digest = candidate.digest();
                    obs::emit_committed(&self.target, attempt, &digest);
                    return Ok(ValidationOutcome {
                        success: true,
                        attempts: attempt,
                        last_error: failures.last().map(|f| f.error.clone()),
                        committed_sha256: Some(digest),
                        failures,
                    });
                }
                Ok(report) => report.detail,
                Err(e) => e.to_string(),
            };

            backup.restore()?;
            self.transition(ValidationState::RolledBack);
            obs::emit_attempt_failed(attempt, &error);
            obs::emit_rolled_back(&self.target, attempt);
            failures.push(AttemptFailure { attempt, error });
        }

        self.transition(ValidationState::Failed);
        backup.restore()?;
        backup.release();

        let last_error = failures.last().map(|f| f.error.clone());
        obs::emit_exhausted(&self.target, self.max_retries, last_error.as_deref());
        Ok(ValidationOutcome {
            success: false,
            attempts: self.max_retries,
            last_error,
            committed_sha256: None,
            failures,
        })
    }
}

impl ValidationOutcome {
    /// Turn an exhausted outcome into [`CovboostError::ValidationExhausted`].
    pub fn into_result(self) -> Result<ValidationOutcome> {
        if self.success {
            Ok(self)
        } else {
            Err(CovboostError::ValidationExhausted {
                attempts: self.attempts,
                last_error: self
                    .last_error
                    .unwrap_or_else(|| "no error recorded".to_string()),
            })
        }
    }
}
