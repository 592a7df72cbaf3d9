use thiserror::Error;

use super::Phase;

/// Any transport, status or payload problem from a single turn request.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("turn request failed: {reason}")]
pub struct TurnFetchFailed {
    pub reason: String,
}

impl TurnFetchFailed {
    pub fn new(reason: &str) -> TurnFetchFailed {
        return TurnFetchFailed {
            reason: reason.to_string(),
        };
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    TurnFetchFailed(#[from] TurnFetchFailed),

    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("cannot {operation} while {phase}")]
    InvalidTransition { operation: String, phase: Phase },
}

impl SessionError {
    pub fn invalid_transition(operation: &str, phase: Phase) -> SessionError {
        return SessionError::InvalidTransition {
            operation: operation.to_string(),
            phase,
        };
    }
}
