//! Cumulative semantic-area weights.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::warn;

/// A named dimension and its accumulated weight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticArea {
    pub label: String,
    pub weight: f64,
}

/// Running sum of the weight deltas attached to step responses.
///
/// Purely additive: no normalization, no decay, no reset until a new session
/// starts. Display-only; nothing in the session flow reads it.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceTracker {
    weights: BTreeMap<String, f64>,
    updates: u64,
}

impl ConvergenceTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every delta to its label's running total.
    pub fn merge(&mut self, deltas: &HashMap<String, f64>) {
        if deltas.is_empty() {
            return;
        }
        for (label, delta) in deltas {
            if !delta.is_finite() {
                warn!(label = %label, "ignoring non-finite semantic weight delta");
                continue;
            }
            *self.weights.entry(label.clone()).or_insert(0.0) += delta;
        }
        self.updates += 1;
    }

    /// Current weight of `label`.
    pub fn weight(&self, label: &str) -> Option<f64> {
        self.weights.get(label).copied()
    }

    /// Number of responses that carried deltas.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Whether nothing has been accumulated yet.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Areas ordered by weight, heaviest first; ties by label.
    pub fn snapshot(&self) -> Vec<SemanticArea> {
        let mut areas: Vec<SemanticArea> = self
            .weights
            .iter()
            .map(|(label, weight)| SemanticArea {
                label: label.clone(),
                weight: *weight,
            })
            .collect();
        areas.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.label.cmp(&b.label)));
        areas
    }

    /// Forget everything (new session only).
    pub(crate) fn reset(&mut self) {
        self.weights.clear();
        self.updates = 0;
    }
}
