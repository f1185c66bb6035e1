//! In-process step service driven by a fixed script.
//!
//! Backs the `--demo` mode of the binary and the test suites. It behaves
//! like a well-mannered server: answers are keyed by step, so re-answering a
//! step replaces everything after it, and every response echoes its token.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::client::{AssetResolver, StepService};
use super::types::{AdvanceRequest, AdvanceResponse, InitSessionResponse};
use crate::error::GuidanceError;
use crate::session::{HistoryEntry, SessionId, Step};
use crate::Result;

/// How many times each endpoint was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub init: usize,
    pub clear: usize,
    pub advance: usize,
    pub analyze: usize,
}

#[derive(Debug)]
struct ScriptState {
    session_seq: u64,
    answers: Vec<String>,
    completed: bool,
    calls: CallCounts,
}

impl ScriptState {
    fn session_id(&self) -> SessionId {
        SessionId::new(format!("scripted-{}", self.session_seq))
    }
}

/// Scripted [`StepService`].
#[derive(Debug)]
pub struct ScriptedStepService {
    steps: Vec<Step>,
    areas: HashMap<String, String>,
    insight_every: usize,
    state: Mutex<ScriptState>,
    failing_inits: AtomicUsize,
    failing_advances: AtomicUsize,
    fail_analyze: AtomicBool,
}

impl ScriptedStepService {
    /// Create a service that serves `steps` in order.
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            areas: HashMap::new(),
            insight_every: 0,
            state: Mutex::new(ScriptState {
                session_seq: 1,
                answers: Vec::new(),
                completed: false,
                calls: CallCounts::default(),
            }),
            failing_inits: AtomicUsize::new(0),
            failing_advances: AtomicUsize::new(0),
            fail_analyze: AtomicBool::new(false),
        }
    }

    /// The built-in vocational interest questionnaire.
    pub fn demo() -> Self {
        let steps = vec![
            Step::text(
                "q-subject",
                "Which school subject do you enjoy the most?",
                ["Mathematics", "Literature", "Biology", "Art"],
            ),
            Step::text(
                "q-afternoon",
                "How would you rather spend a free afternoon?",
                ["Fixing a bike", "Writing a story", "Volunteering", "Painting"],
            ),
            Step::image(
                "q-workplace",
                "Which workplace appeals to you the most?",
                ["Laboratory", "Design studio", "Hospital ward", "Workshop"],
            )
            .with_reasoning("Your first answers point in several directions; places help narrow it down."),
            Step::text(
                "q-group",
                "In a group project you usually...",
                ["Organise the plan", "Come up with ideas", "Support the others", "Do the hands-on work"],
            ),
            Step::image(
                "q-tools",
                "Which of these would you pick up first?",
                ["Microscope", "Sketchbook", "Stethoscope", "Toolbox"],
            ),
            Step::text(
                "q-values",
                "What matters most to you in a future job?",
                ["Solving hard problems", "Creative freedom", "Helping people", "Tangible results"],
            ),
        ];

        let areas = [
            ("Mathematics", "Investigative"),
            ("Literature", "Artistic"),
            ("Biology", "Investigative"),
            ("Art", "Artistic"),
            ("Fixing a bike", "Realistic"),
            ("Writing a story", "Artistic"),
            ("Volunteering", "Social"),
            ("Painting", "Artistic"),
            ("Laboratory", "Investigative"),
            ("Design studio", "Artistic"),
            ("Hospital ward", "Social"),
            ("Workshop", "Realistic"),
            ("Organise the plan", "Enterprising"),
            ("Come up with ideas", "Artistic"),
            ("Support the others", "Social"),
            ("Do the hands-on work", "Realistic"),
            ("Microscope", "Investigative"),
            ("Sketchbook", "Artistic"),
            ("Stethoscope", "Social"),
            ("Toolbox", "Realistic"),
            ("Solving hard problems", "Investigative"),
            ("Creative freedom", "Artistic"),
            ("Helping people", "Social"),
            ("Tangible results", "Realistic"),
        ];

        Self::new(steps).with_areas(areas).with_insight_every(3)
    }

    /// Map option labels to the semantic area they count towards.
    ///
    /// Unmapped answers count towards an area named after the answer itself.
    pub fn with_areas<I, K, V>(mut self, areas: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.areas
            .extend(areas.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Attach a transition insight after every `n` answers (0 disables).
    pub fn with_insight_every(mut self, n: usize) -> Self {
        self.insight_every = n;
        self
    }

    /// Start with the first answers already given.
    pub fn with_answers<I, S>(self, answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Ok(mut state) = self.state.lock() {
            state.answers = answers.into_iter().map(Into::into).collect();
            state.completed = !self.steps.is_empty() && state.answers.len() >= self.steps.len();
        }
        self
    }

    /// Start with every step answered.
    pub fn completed(self) -> Self {
        let answers: Vec<String> = self
            .steps
            .iter()
            .map(|s| s.options.first().cloned().unwrap_or_default())
            .collect();
        self.with_answers(answers)
    }

    /// Make the next `n` initialization calls fail with a transport error.
    pub fn fail_next_inits(&self, n: usize) {
        self.failing_inits.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` advance calls fail with a transport error.
    pub fn fail_next_advances(&self, n: usize) {
        self.failing_advances.store(n, Ordering::SeqCst);
    }

    /// Make analysis calls fail.
    pub fn set_fail_analyze(&self, fail: bool) {
        self.fail_analyze.store(fail, Ordering::SeqCst);
    }

    /// Answers currently stored server-side.
    pub fn answers(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.answers.clone())
            .unwrap_or_default()
    }

    /// Per-endpoint call counts.
    pub fn calls(&self) -> CallCounts {
        self.state.lock().map(|s| s.calls).unwrap_or_default()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn rejected(request: &AdvanceRequest, message: impl Into<String>) -> AdvanceResponse {
        AdvanceResponse {
            success: false,
            message: Some(message.into()),
            completed: false,
            ..AdvanceResponse::completed(request.request_token.clone())
        }
    }
}

#[async_trait]
impl StepService for ScriptedStepService {
    async fn init_session(&self) -> Result<InitSessionResponse> {
        let mut state = self.state.lock().map_err(|_| GuidanceError::LockPoisoned)?;
        state.calls.init += 1;

        if Self::take_failure(&self.failing_inits) {
            return Err(GuidanceError::Transport("scripted init failure".into()));
        }

        let index = state.answers.len().min(self.steps.len());
        let history = (index > 0).then(|| {
            self.steps
                .iter()
                .zip(state.answers.iter())
                .map(|(step, answer)| HistoryEntry::answered(step.clone(), answer.clone()))
                .collect()
        });

        Ok(InitSessionResponse {
            success: true,
            message: None,
            session_id: Some(state.session_id()),
            current_index: index,
            total_questions: self.steps.len(),
            current_step: if state.completed {
                None
            } else {
                self.steps.get(index).cloned()
            },
            history,
            completed: state.completed,
        })
    }

    async fn clear_session(&self, session_id: &SessionId) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| GuidanceError::LockPoisoned)?;
        state.calls.clear += 1;

        if *session_id != state.session_id() {
            return Err(GuidanceError::Rejected(format!("unknown session {}", session_id)));
        }
        state.session_seq += 1;
        state.answers.clear();
        state.completed = false;
        Ok(())
    }

    async fn advance(&self, request: &AdvanceRequest) -> Result<AdvanceResponse> {
        let mut state = self.state.lock().map_err(|_| GuidanceError::LockPoisoned)?;
        state.calls.advance += 1;

        if Self::take_failure(&self.failing_advances) {
            return Err(GuidanceError::Transport("scripted advance failure".into()));
        }
        if request.session_id != state.session_id() {
            return Ok(Self::rejected(request, "unknown session"));
        }
        if state.completed {
            return Ok(Self::rejected(request, "session already completed"));
        }
        let Some(position) = self.steps.iter().position(|s| s.id == request.step_id) else {
            return Ok(Self::rejected(request, format!("unknown step {}", request.step_id)));
        };
        if position > state.answers.len() {
            return Ok(Self::rejected(request, "step has not been reached yet"));
        }

        state.answers.truncate(position);
        state.answers.push(request.answer.clone());
        let answered = state.answers.len();

        let area = self
            .areas
            .get(&request.answer)
            .cloned()
            .unwrap_or_else(|| request.answer.clone());
        let token = request.request_token.clone();

        if answered >= self.steps.len() {
            state.completed = true;
            return Ok(AdvanceResponse::completed(token).with_deltas([(area, 1.0)]));
        }

        let mut response =
            AdvanceResponse::next(token, self.steps[answered].clone()).with_deltas([(area, 1.0)]);
        if self.insight_every > 0 && answered % self.insight_every == 0 {
            response = response.with_insight(format!(
                "{} answers in. Your profile is starting to take shape.",
                answered
            ));
        }
        Ok(response)
    }

    async fn analyze(&self, _session_id: &SessionId) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| GuidanceError::LockPoisoned)?;
        state.calls.analyze += 1;

        if self.fail_analyze.load(Ordering::SeqCst) {
            return Err(GuidanceError::Transport("scripted analysis failure".into()));
        }
        Ok(())
    }
}

/// Scripted [`AssetResolver`]: deterministic URLs derived from the label.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAssetResolver {
    failing: Vec<String>,
}

impl ScriptedAssetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make resolution of `label` fail.
    pub fn failing(mut self, label: impl Into<String>) -> Self {
        self.failing.push(label.into());
        self
    }

    /// URL served for `label`.
    pub fn url_for(label: &str) -> String {
        let slug: String = label
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect();
        format!("https://assets.example.com/options/{}.png", slug)
    }
}

#[async_trait]
impl AssetResolver for ScriptedAssetResolver {
    async fn resolve(&self, option_label: &str) -> Result<String> {
        if self.failing.iter().any(|l| l == option_label) {
            return Err(GuidanceError::Rejected(format!(
                "no asset for option '{}'",
                option_label
            )));
        }
        Ok(Self::url_for(option_label))
    }
}
