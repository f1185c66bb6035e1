//! Passive feedback attached to step responses.

mod convergence;
mod transition;

pub use convergence::{ConvergenceTracker, SemanticArea};
pub use transition::{TransitionInsight, TransitionInsightPresenter};
