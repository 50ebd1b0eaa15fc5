//! Validator states and the terminal outcome of a validation run.

use serde::{Deserialize, Serialize};

/// States of the transactional validation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    Init,
    Attempting,
    Committed,
    RolledBack,
    Failed,
}

impl ValidationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ValidationState::Committed | ValidationState::Failed)
    }

    /// Whether the loop may move from `self` to `next`.
    pub fn can_transition_to(&self, next: ValidationState) -> bool {
        use ValidationState::*;
        matches!(
            (self, next),
            (Init, Attempting)
                | (Init, Failed)
                | (Attempting, Committed)
                | (Attempting, RolledBack)
                | (RolledBack, Attempting)
                | (RolledBack, Failed)
        )
    }
}

/// One failed attempt, kept for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptFailure {
    pub attempt: u32,
    pub error: String,
}

/// Terminal result of [`crate::validator::Validator::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub success: bool,
    pub attempts: u32,
    pub last_error: Option<String>,

    /// Digest of the committed candidate (success only).
    pub committed_sha256: Option<String>,

    pub failures: Vec<AttemptFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(ValidationState::Committed.is_terminal());
        assert!(ValidationState::Failed.is_terminal());
        assert!(!ValidationState::RolledBack.is_terminal());
        assert!(!ValidationState::Attempting.is_terminal());
    }

    #[test]
    fn test_transitions() {
        use ValidationState::*;
        assert!(Init.can_transition_to(Attempting));
        assert!(Attempting.can_transition_to(RolledBack));
        assert!(RolledBack.can_transition_to(Attempting));
        assert!(RolledBack.can_transition_to(Failed));
        assert!(!Committed.can_transition_to(Attempting));
        assert!(!Failed.can_transition_to(Attempting));
        assert!(!Attempting.can_transition_to(Failed));
    }
}
