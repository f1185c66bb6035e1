//! Per-option media resolution for image steps.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::race::{settle_within, Settled};
use super::timer::{Timer, TokioTimer};
use crate::api::AssetResolver;
use crate::session::Step;

/// Default global timeout for one step's batch of resolutions.
pub const DEFAULT_PREFETCH_TIMEOUT: Duration = Duration::from_secs(25);

/// Default reference substituted for options that could not be resolved.
pub const DEFAULT_PLACEHOLDER: &str = "/static/img/option-placeholder.png";

/// Counts of how each option of a step was resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchReport {
    /// Options with a real media reference.
    pub resolved: usize,
    /// Options whose resolution call failed.
    pub failed: usize,
    /// Options still unresolved when the timeout fired.
    pub timed_out: usize,
}

impl PrefetchReport {
    /// Number of options that fell back to the placeholder.
    pub fn placeholders(&self) -> usize {
        self.failed + self.timed_out
    }
}

/// Resolves the media of every option of an image step before it is shown.
///
/// All options are resolved concurrently and the whole batch races a single
/// timeout. Whatever did not resolve successfully in time gets the same
/// placeholder, so the step is always revealed with one reference per option.
#[derive(Clone)]
pub struct AssetPrefetcher {
    resolver: Arc<dyn AssetResolver>,
    timer: Arc<dyn Timer>,
    timeout: Duration,
    placeholder: String,
}

impl AssetPrefetcher {
    /// Create a prefetcher with the default timeout and placeholder.
    pub fn new(resolver: Arc<dyn AssetResolver>) -> Self {
        Self {
            resolver,
            timer: Arc::new(TokioTimer),
            timeout: DEFAULT_PREFETCH_TIMEOUT,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }

    /// Set the batch timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the placeholder reference. A blank one keeps the default.
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        let placeholder = placeholder.into();
        if placeholder.trim().is_empty() {
            warn!("blank placeholder ignored, keeping {}", self.placeholder);
        } else {
            self.placeholder = placeholder;
        }
        self
    }

    /// Replace the timer (tests inject a manual one).
    pub fn with_timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = timer;
        self
    }

    /// The placeholder reference.
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// The batch timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fill `step.resolved_assets`, one entry per option.
    ///
    /// Text steps and steps that are already fully resolved are left alone.
    pub async fn resolve(&self, step: &mut Step) -> PrefetchReport {
        if !step.needs_assets() {
            return PrefetchReport::default();
        }

        let tasks: Vec<_> = step
            .options
            .iter()
            .map(|label| {
                let resolver = Arc::clone(&self.resolver);
                let label = label.clone();
                async move { resolver.resolve(&label).await }
            })
            .collect();

        let (slots, timed_out) = settle_within(tasks, self.timer.sleep(self.timeout)).await;

        let mut report = PrefetchReport::default();
        let assets = slots
            .into_iter()
            .map(|slot| match slot {
                Settled::Resolved(url) if !url.is_empty() => {
                    report.resolved += 1;
                    url
                }
                Settled::Resolved(_) | Settled::Failed(_) => {
                    report.failed += 1;
                    self.placeholder.clone()
                }
                Settled::Pending => {
                    report.timed_out += 1;
                    self.placeholder.clone()
                }
            })
            .collect();
        step.resolved_assets = Some(assets);

        debug!(
            step = %step.id,
            resolved = report.resolved,
            failed = report.failed,
            timed_out = report.timed_out,
            deadline_hit = timed_out,
            "option assets prefetched"
        );
        report
    }
}
