//! Wire types exchanged with the remote step service.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::insight::TransitionInsight;
use crate::session::{HistoryEntry, RequestToken, SessionId, Step};

/// Response of the session initialization call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitSessionResponse {
    #[serde(default)]
    pub success: bool,
    /// Error description when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    /// Index of the step the user should answer next.
    #[serde(default)]
    pub current_index: usize,
    #[serde(default, alias = "total_steps")]
    pub total_questions: usize,
    #[serde(default)]
    pub current_step: Option<Step>,
    /// Steps already answered, oldest first.
    #[serde(default, alias = "full_history", alias = "full_step_and_answer_history")]
    pub history: Option<Vec<HistoryEntry>>,
    #[serde(default, alias = "completed_flag")]
    pub completed: bool,
}

/// Request to advance the session by answering a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvanceRequest {
    pub session_id: SessionId,
    pub step_id: String,
    pub answer: String,
    /// True when the answer revises a step before the newest one.
    pub is_edit: bool,
    /// Echoed back in the response.
    pub request_token: RequestToken,
}

/// Response of the step-advance call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceResponse {
    pub request_token: RequestToken,
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub next_step: Option<Step>,
    #[serde(default, alias = "completed_flag")]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_weight_deltas: Option<HashMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_insight: Option<String>,
}

impl AdvanceResponse {
    /// A successful response carrying the next step.
    pub fn next(request_token: RequestToken, step: Step) -> Self {
        Self {
            request_token,
            success: true,
            message: None,
            next_step: Some(step),
            completed: false,
            semantic_weight_deltas: None,
            transition_insight: None,
        }
    }

    /// A successful response signalling completion.
    pub fn completed(request_token: RequestToken) -> Self {
        Self {
            request_token,
            success: true,
            message: None,
            next_step: None,
            completed: true,
            semantic_weight_deltas: None,
            transition_insight: None,
        }
    }

    /// Attach semantic weight deltas.
    pub fn with_deltas<I, S>(mut self, deltas: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        self.semantic_weight_deltas = Some(deltas.into_iter().map(|(k, v)| (k.into(), v)).collect());
        self
    }

    /// Attach a transition insight.
    pub fn with_insight(mut self, text: impl Into<String>) -> Self {
        self.transition_insight = Some(text.into());
        self
    }

    /// The insight payload, if any.
    pub fn insight(&self) -> Option<TransitionInsight> {
        self.transition_insight.clone().map(TransitionInsight::new)
    }
}

/// Request carrying only a session id (clear, analyze).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub session_id: SessionId,
}

/// Generic success/failure acknowledgement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Request to resolve the media of one option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRequest {
    pub option_label: String,
}

/// Response of the per-option asset call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, alias = "url")]
    pub resolved_url: Option<String>,
}
