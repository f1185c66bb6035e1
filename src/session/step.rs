//! Questionnaire steps and history entries.

use serde::{Deserialize, Serialize};

/// How a step's options are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Options are plain text.
    #[default]
    Text,
    /// Each option is illustrated by media resolved before the step is shown.
    Image,
}

/// One unit of the questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Server-assigned step identifier.
    pub id: String,
    /// Question text.
    pub prompt: String,
    /// Presentation kind.
    #[serde(default)]
    pub kind: StepKind,
    /// Selectable options, in display order.
    #[serde(default)]
    pub options: Vec<String>,
    /// Optional explanation of why this step was generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Per-option media references, index-aligned with `options`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_assets: Option<Vec<String>>,
}

impl Step {
    /// Create a text step.
    pub fn text<I, S>(id: impl Into<String>, prompt: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            kind: StepKind::Text,
            options: options.into_iter().map(Into::into).collect(),
            reasoning: None,
            resolved_assets: None,
        }
    }

    /// Create an image step.
    pub fn image<I, S>(id: impl Into<String>, prompt: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: StepKind::Image,
            ..Self::text(id, prompt, options)
        }
    }

    /// Attach a reasoning note.
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Whether this step needs per-option media before it can be shown.
    pub fn needs_assets(&self) -> bool {
        self.kind == StepKind::Image && !self.is_fully_resolved()
    }

    /// Whether every option has a media reference.
    pub fn is_fully_resolved(&self) -> bool {
        match &self.resolved_assets {
            Some(assets) => {
                assets.len() == self.options.len() && assets.iter().all(|a| !a.is_empty())
            }
            None => false,
        }
    }

    /// Check whether `answer` is one of the options.
    ///
    /// Steps without options accept any answer.
    pub fn accepts(&self, answer: &str) -> bool {
        self.options.is_empty() || self.options.iter().any(|o| o == answer)
    }
}

/// A step together with the answer given to it (if any yet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The step as it was shown.
    pub step: Step,
    /// The selected answer.
    #[serde(default)]
    pub answer: Option<String>,
}

impl HistoryEntry {
    /// Create an unanswered entry.
    pub fn new(step: Step) -> Self {
        Self { step, answer: None }
    }

    /// Create an answered entry.
    pub fn answered(step: Step, answer: impl Into<String>) -> Self {
        Self {
            step,
            answer: Some(answer.into()),
        }
    }
}
