//! Test session management.
//!
//! This module provides the session controller and the pieces it is built
//! from: lifecycle state, step history, request gating and identifiers.

mod controller;
mod gate;
mod history;
mod id;
mod state;
mod step;

pub use controller::{AdvanceOutcome, Completion, Session, SessionController, Submission};
pub use gate::RequestGate;
pub use history::{AnswerChange, StepHistory};
pub use id::{RequestToken, SessionId};
pub use state::LifecycleState;
pub use step::{HistoryEntry, Step, StepKind};
