//! Top-level test session state machine.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::{
    AnswerChange, HistoryEntry, LifecycleState, RequestGate, RequestToken, SessionId, Step,
    StepHistory,
};
use crate::api::{AdvanceRequest, AdvanceResponse, InitSessionResponse, StepService};
use crate::error::GuidanceError;
use crate::insight::{ConvergenceTracker, TransitionInsight, TransitionInsightPresenter};
use crate::notify::{InvalidationBus, Topic};
use crate::prefetch::AssetPrefetcher;
use crate::Result;

/// Snapshot of the session as seen by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub current_index: usize,
    pub total_steps: usize,
    pub lifecycle: LifecycleState,
}

/// Context stored with each issued token.
#[derive(Debug, Clone, Copy)]
struct Dispatch {
    from_index: usize,
}

/// Result of recording an answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// An unchanged past answer; the cursor moved forward, nothing to send.
    Navigated { index: usize },
    /// A request that must be dispatched to the step service.
    Request(AdvanceRequest),
}

/// A finished step-advance call, successful or not.
#[derive(Debug)]
pub struct Completion {
    pub token: RequestToken,
    pub result: Result<AdvanceResponse>,
}

/// What applying a response (or a whole submission) did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The response belonged to a superseded request and was dropped.
    Stale,
    /// Moved through cached history without a request.
    Navigated { index: usize },
    /// A new step was appended at `index`.
    Advanced { index: usize },
    /// The session completed.
    Finished,
}

/// Drives one student through the adaptive questionnaire.
///
/// Owns the lifecycle, the step history, the request gate and the
/// convergence/insight state; collaborators only report results back.
/// Requests may be dispatched concurrently through [`dispatch`], but only the
/// most recently issued one is ever applied.
///
/// [`dispatch`]: SessionController::dispatch
pub struct SessionController {
    service: Arc<dyn StepService>,
    prefetcher: AssetPrefetcher,
    bus: Option<InvalidationBus>,
    lifecycle: LifecycleState,
    session_id: Option<SessionId>,
    total_steps: usize,
    history: StepHistory,
    gate: RequestGate<Dispatch>,
    convergence: ConvergenceTracker,
    insight: TransitionInsightPresenter,
    landing: Option<InitSessionResponse>,
    edit_from: Option<usize>,
    advance_error: Option<String>,
    last_error: Option<String>,
}

impl SessionController {
    /// Create a controller in the `Loading` state. Call [`initialize`] next.
    ///
    /// [`initialize`]: SessionController::initialize
    pub fn new(service: Arc<dyn StepService>, prefetcher: AssetPrefetcher) -> Self {
        Self {
            service,
            prefetcher,
            bus: None,
            lifecycle: LifecycleState::Loading,
            session_id: None,
            total_steps: 0,
            history: StepHistory::new(),
            gate: RequestGate::new(),
            convergence: ConvergenceTracker::new(),
            insight: TransitionInsightPresenter::new(),
            landing: None,
            edit_from: None,
            advance_error: None,
            last_error: None,
        }
    }

    /// Publish invalidations on `bus` when sessions are cleared or completed.
    pub fn with_invalidation_bus(mut self, bus: InvalidationBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Load the session from the server and pick the starting state.
    ///
    /// Safe to call repeatedly; all in-memory state is rebuilt. On failure
    /// the controller enters `Error` and the error is returned.
    pub async fn initialize(&mut self) -> Result<LifecycleState> {
        self.transition(LifecycleState::Loading)?;
        self.reset_local();

        let response = match self.service.init_session().await {
            Ok(response) => response,
            Err(e) => return Err(self.fail_initialization(e)),
        };

        match self.apply_init(response).await {
            Ok(state) => Ok(state),
            Err(e) => Err(self.fail_initialization(e)),
        }
    }

    async fn apply_init(&mut self, response: InitSessionResponse) -> Result<LifecycleState> {
        if !response.success {
            return Err(GuidanceError::Rejected(
                response
                    .message
                    .unwrap_or_else(|| "session initialization rejected".into()),
            ));
        }
        let session_id = response
            .session_id
            .clone()
            .ok_or_else(|| GuidanceError::InconsistentSession("missing session id".into()))?;
        if response.current_index > response.total_questions {
            return Err(GuidanceError::InconsistentSession(format!(
                "current index {} beyond {} steps",
                response.current_index, response.total_questions
            )));
        }

        self.session_id = Some(session_id);
        self.total_steps = response.total_questions;

        if response.completed {
            self.transition(LifecycleState::Finished)?;
            return Ok(LifecycleState::Finished);
        }

        if response.current_step.is_none() {
            return Err(GuidanceError::InconsistentSession(
                "open session without a current step".into(),
            ));
        }

        if response.current_index == 0 {
            let Some(mut step) = response.current_step else {
                return Err(GuidanceError::InconsistentSession("missing first step".into()));
            };
            self.prefetcher.resolve(&mut step).await;
            self.history.append(0, step, None)?;
            self.transition(LifecycleState::Active)?;
            return Ok(LifecycleState::Active);
        }

        self.landing = Some(response);
        self.transition(LifecycleState::Landing)?;
        Ok(LifecycleState::Landing)
    }

    /// Continue the in-progress session found by [`initialize`].
    ///
    /// Rebuilds the history from the data already received; the step service
    /// is not called. An image step still has its option media resolved.
    ///
    /// [`initialize`]: SessionController::initialize
    pub async fn resume(&mut self) -> Result<()> {
        self.require(LifecycleState::Landing, "resume")?;
        let landing = self.landing.take().ok_or(GuidanceError::InvalidOperation {
            operation: "resume",
            state: self.lifecycle,
        })?;

        match self.rebuild_history(landing).await {
            Ok(history) => {
                self.history = history;
                self.transition(LifecycleState::Active)?;
                info!(index = self.history.current_index(), "session resumed");
                Ok(())
            }
            Err(e) => Err(self.fail_initialization(e)),
        }
    }

    async fn rebuild_history(&self, landing: InitSessionResponse) -> Result<StepHistory> {
        let index = landing.current_index;
        let mut entries = landing.history.unwrap_or_default();
        let mut current = landing.current_step.ok_or_else(|| {
            GuidanceError::InconsistentSession("open session without a current step".into())
        })?;

        if entries.len() < index {
            return Err(GuidanceError::InconsistentSession(format!(
                "history has {} entries, expected {}",
                entries.len(),
                index
            )));
        }

        // The server may include the current step with a draft answer.
        let preselected = entries
            .get(index)
            .filter(|e| e.step.id == current.id)
            .and_then(|e| e.answer.clone());
        entries.truncate(index);

        self.prefetcher.resolve(&mut current).await;
        entries.push(HistoryEntry {
            step: current,
            answer: preselected,
        });
        Ok(StepHistory::from_entries(entries))
    }

    /// Destroy the session server-side and start over.
    pub async fn restart(&mut self) -> Result<LifecycleState> {
        if !self.lifecycle.can_restart() {
            return Err(GuidanceError::InvalidOperation {
                operation: "restart",
                state: self.lifecycle,
            });
        }
        let session_id = self.session_id.clone().ok_or(GuidanceError::InvalidOperation {
            operation: "restart",
            state: self.lifecycle,
        })?;

        self.transition(LifecycleState::Loading)?;
        self.reset_local();

        if let Err(e) = self.service.clear_session(&session_id).await {
            return Err(self.fail_initialization(e));
        }
        info!(session = %session_id, "session cleared");
        self.publish(Topic::SessionProgress, &session_id);

        self.initialize().await
    }

    /// Re-run initialization after a failure.
    pub async fn retry(&mut self) -> Result<LifecycleState> {
        self.require(LifecycleState::Error, "retry")?;
        self.initialize().await
    }

    /// Release the controller. Progress stays on the server.
    pub fn leave(self) {
        info!(
            lifecycle = ?self.lifecycle,
            index = self.history.current_index(),
            requests = self.gate.issued_count(),
            discarded = self.gate.discarded_count(),
            insights = self.insight.shown_count(),
            weight_updates = self.convergence.updates(),
            "leaving test session"
        );
    }

    /// Record `answer` for the step on screen.
    ///
    /// Returns the request to dispatch, or `Navigated` when an unchanged past
    /// answer lets the cursor move forward without asking the server. A
    /// changed past answer truncates everything after it first.
    pub fn begin_answer(&mut self, answer: impl Into<String>) -> Result<Submission> {
        self.require(LifecycleState::Active, "answer")?;
        if self.insight.is_blocking() {
            return Err(GuidanceError::InvalidOperation {
                operation: "answer before dismissing the insight",
                state: self.lifecycle,
            });
        }
        let answer = answer.into();
        let session_id = self.session_id.clone().ok_or_else(|| {
            GuidanceError::InconsistentSession("active session without an id".into())
        })?;

        let index = self.history.current_index();
        let step = &self
            .history
            .current()
            .ok_or_else(|| GuidanceError::InconsistentSession("no current step".into()))?
            .step;
        if !step.accepts(&answer) {
            return Err(GuidanceError::InvalidAnswer {
                step_id: step.id.clone(),
                answer,
            });
        }
        let step_id = step.id.clone();

        let is_edit = match self.history.record_answer_at(index, answer.clone())? {
            AnswerChange::Unchanged => {
                self.advance_error = None;
                return Ok(Submission::Navigated {
                    index: self.history.current_index(),
                });
            }
            AnswerChange::Truncated { removed } => {
                debug!(index, removed, "changed answer truncated history");
                self.edit_from = Some(index);
                true
            }
            AnswerChange::Recorded => self.edit_from == Some(index),
        };

        let request_token = self.gate.issue(Dispatch { from_index: index });
        self.advance_error = None;
        debug!(token = %request_token, index, is_edit, "step advance issued");

        Ok(Submission::Request(AdvanceRequest {
            session_id,
            step_id,
            answer,
            is_edit,
            request_token,
        }))
    }

    /// Send `request` to the step service.
    ///
    /// The returned future does not borrow the controller, so several can be
    /// in flight while the user keeps interacting.
    pub fn dispatch(&self, request: AdvanceRequest) -> impl Future<Output = Completion> + Send + 'static {
        let service = Arc::clone(&self.service);
        async move {
            let result = service.advance(&request).await;
            Completion {
                token: request.request_token,
                result,
            }
        }
    }

    /// Apply a finished step-advance call.
    ///
    /// Responses to superseded requests yield `Stale` and change nothing.
    /// Failures of the latest request are recorded in [`advance_error`] and
    /// returned; the current step and its answer are kept for a retry.
    ///
    /// [`advance_error`]: SessionController::advance_error
    pub async fn apply_advance(&mut self, completion: Completion) -> Result<AdvanceOutcome> {
        let Completion { token, result } = completion;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                if self.gate.reject(&token).is_none() {
                    debug!(%token, "ignoring failure of superseded request");
                    return Ok(AdvanceOutcome::Stale);
                }
                return Err(self.fail_advance(e));
            }
        };

        let Some(dispatch) = self.gate.accept(&response.request_token) else {
            debug!(
                token = %response.request_token,
                latest_accepted = ?self.gate.latest_accepted(),
                "discarding stale step response"
            );
            return Ok(AdvanceOutcome::Stale);
        };

        if !response.success {
            let message = response
                .message
                .clone()
                .unwrap_or_else(|| "step advance rejected".into());
            return Err(self.fail_advance(GuidanceError::Rejected(message)));
        }

        if let Some(ref deltas) = response.semantic_weight_deltas {
            self.convergence.merge(deltas);
        }

        if response.completed {
            self.edit_from = None;
            self.finish().await?;
            return Ok(AdvanceOutcome::Finished);
        }

        let insight = response.insight();
        let Some(mut step) = response.next_step else {
            return Err(self.fail_advance(GuidanceError::InconsistentSession(
                "response carries neither a next step nor completion".into(),
            )));
        };

        let index = dispatch.from_index + 1;
        if index > self.total_steps {
            return Err(self.fail_advance(GuidanceError::InconsistentSession(format!(
                "step index {} beyond {} steps",
                index, self.total_steps
            ))));
        }

        self.prefetcher.resolve(&mut step).await;
        if let Err(e) = self.history.append(index, step, None) {
            return Err(self.fail_advance(e));
        }
        if self.edit_from == Some(dispatch.from_index) {
            self.edit_from = None;
        }
        self.insight.present(insight);
        self.transition(LifecycleState::Active)?;
        info!(index, total = self.total_steps, "advanced to next step");

        Ok(AdvanceOutcome::Advanced { index })
    }

    /// Record, dispatch and apply an answer in one go.
    pub async fn submit(&mut self, answer: impl Into<String>) -> Result<AdvanceOutcome> {
        match self.begin_answer(answer)? {
            Submission::Navigated { index } => Ok(AdvanceOutcome::Navigated { index }),
            Submission::Request(request) => {
                let completion = self.dispatch(request).await;
                self.apply_advance(completion).await
            }
        }
    }

    /// Go back one step, returning the answer given there.
    pub fn navigate_back(&mut self) -> Result<Option<String>> {
        self.require(LifecycleState::Active, "navigate back")?;
        if self.insight.is_blocking() {
            return Err(GuidanceError::InvalidOperation {
                operation: "navigate before dismissing the insight",
                state: self.lifecycle,
            });
        }
        let answer = self.history.navigate_back()?.map(str::to_string);
        self.advance_error = None;
        Ok(answer)
    }

    /// Dismiss the transition insight, revealing the step underneath.
    pub fn dismiss_insight(&mut self) -> Option<TransitionInsight> {
        self.insight.dismiss()
    }

    async fn finish(&mut self) -> Result<()> {
        self.transition(LifecycleState::Finished)?;
        self.insight.dismiss();

        if let Some(session_id) = self.session_id.clone() {
            if let Err(e) = self.service.analyze(&session_id).await {
                warn!(error = %e, "analysis request failed");
            }
            self.publish(Topic::Results, &session_id);
        }
        info!(steps = self.history.len(), "session finished");
        Ok(())
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle
    }

    /// Session snapshot, once the server assigned an id.
    pub fn session(&self) -> Option<Session> {
        self.session_id.as_ref().map(|id| Session {
            id: id.clone(),
            current_index: self.current_index(),
            total_steps: self.total_steps,
            lifecycle: self.lifecycle,
        })
    }

    /// Index of the step the user is on.
    pub fn current_index(&self) -> usize {
        match &self.landing {
            Some(landing) => landing.current_index,
            None => self.history.current_index(),
        }
    }

    /// Number of steps in the questionnaire.
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// The step history.
    pub fn history(&self) -> &StepHistory {
        &self.history
    }

    /// The step the UI may show, if any.
    ///
    /// `None` unless `Active`, while a transition insight is pending, or if
    /// an image step is missing option media.
    pub fn visible_step(&self) -> Option<&Step> {
        if !self.lifecycle.is_active() || self.insight.is_blocking() {
            return None;
        }
        let step = &self.history.current()?.step;
        if step.needs_assets() {
            return None;
        }
        Some(step)
    }

    /// Answer pre-selected on the current step.
    pub fn selected_answer(&self) -> Option<&str> {
        self.history.current()?.answer.as_deref()
    }

    /// The pending transition insight.
    pub fn insight(&self) -> Option<&TransitionInsight> {
        self.insight.current()
    }

    /// Accumulated semantic-area weights.
    pub fn convergence(&self) -> &ConvergenceTracker {
        &self.convergence
    }

    /// Failure of the latest step advance, cleared by the next attempt.
    pub fn advance_error(&self) -> Option<&str> {
        self.advance_error.as_deref()
    }

    /// Failure that put the controller in `Error`.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether an authoritative request is still outstanding.
    pub fn has_pending_request(&self) -> bool {
        self.gate.has_pending()
    }

    /// Number of responses dropped as stale.
    pub fn discarded_responses(&self) -> u64 {
        self.gate.discarded_count()
    }

    fn transition(&mut self, to: LifecycleState) -> Result<()> {
        let from = self.lifecycle;
        self.lifecycle.transition_to(to)?;
        if from != to {
            info!(?from, ?to, "session lifecycle");
        }
        Ok(())
    }

    fn require(&self, state: LifecycleState, operation: &'static str) -> Result<()> {
        if self.lifecycle != state {
            return Err(GuidanceError::InvalidOperation {
                operation,
                state: self.lifecycle,
            });
        }
        Ok(())
    }

    fn reset_local(&mut self) {
        self.session_id = None;
        self.total_steps = 0;
        self.history.clear();
        self.gate.invalidate();
        self.convergence.reset();
        self.insight.reset();
        self.landing = None;
        self.edit_from = None;
        self.advance_error = None;
        self.last_error = None;
    }

    fn fail_initialization(&mut self, e: GuidanceError) -> GuidanceError {
        error!(error = %e, "session initialization failed");
        self.reset_local();
        self.last_error = Some(e.to_string());
        // Loading -> Error is always valid; Landing -> Error goes via Loading.
        let _ = self.transition(LifecycleState::Loading);
        let _ = self.transition(LifecycleState::Error);
        e
    }

    fn fail_advance(&mut self, e: GuidanceError) -> GuidanceError {
        warn!(error = %e, "step advance failed");
        self.advance_error = Some(e.to_string());
        e
    }

    fn publish(&self, topic: Topic, session_id: &SessionId) {
        if let Some(ref bus) = self.bus {
            bus.publish(topic, Some(session_id.as_str()));
        }
    }
}
