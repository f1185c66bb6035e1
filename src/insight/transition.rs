//! Dismissible overlay shown between steps.

use serde::{Deserialize, Serialize};

/// A short message revealed before the next step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionInsight {
    pub text: String,
}

impl TransitionInsight {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Holds at most one pending insight.
///
/// While an insight is pending the already-loaded next step stays hidden.
/// Dismissal is purely local.
#[derive(Debug, Clone, Default)]
pub struct TransitionInsightPresenter {
    pending: Option<TransitionInsight>,
    shown: u64,
}

impl TransitionInsightPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `insight` if there is one. Blank text is ignored.
    pub fn present(&mut self, insight: Option<TransitionInsight>) {
        match insight {
            Some(insight) if !insight.text.trim().is_empty() => {
                self.pending = Some(insight);
                self.shown += 1;
            }
            _ => self.pending = None,
        }
    }

    /// Whether the overlay currently hides the step.
    pub fn is_blocking(&self) -> bool {
        self.pending.is_some()
    }

    /// The insight being shown.
    pub fn current(&self) -> Option<&TransitionInsight> {
        self.pending.as_ref()
    }

    /// Consume the insight, revealing the step underneath.
    pub fn dismiss(&mut self) -> Option<TransitionInsight> {
        self.pending.take()
    }

    /// Number of insights presented this session.
    pub fn shown_count(&self) -> u64 {
        self.shown
    }

    pub(crate) fn reset(&mut self) {
        self.pending = None;
        self.shown = 0;
    }
}
