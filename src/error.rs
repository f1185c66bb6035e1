//! Error types for guidance-session.

use thiserror::Error;

use crate::session::LifecycleState;

/// Main error type for guidance-session operations.
#[derive(Error, Debug)]
pub enum GuidanceError {
    /// The remote service could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote call did not complete in time.
    #[error("request timeout")]
    Timeout,

    /// The remote service answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The remote service answered but reported failure.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The remote service returned data that contradicts local state.
    #[error("inconsistent session data: {0}")]
    InconsistentSession(String),

    /// Invalid lifecycle transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    /// Operation not allowed in the current lifecycle state.
    #[error("cannot {operation} while {state:?}")]
    InvalidOperation {
        operation: &'static str,
        state: LifecycleState,
    },

    /// History index outside the recorded range.
    #[error("history index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A step was appended somewhere other than the next slot.
    #[error("out-of-order append: expected index {expected}, got {actual}")]
    OutOfOrderAppend { expected: usize, actual: usize },

    /// Back navigation attempted on the first step.
    #[error("already at the first step")]
    AtFirstStep,

    /// The answer is not one of the step's options.
    #[error("invalid answer for step {step_id}: {answer}")]
    InvalidAnswer { step_id: String, answer: String },

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for GuidanceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if let Some(status) = e.status() {
            Self::Http {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Convenience Result type for guidance-session operations.
pub type Result<T> = std::result::Result<T, GuidanceError>;
