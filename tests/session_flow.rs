//! Session flow integration tests.
//!
//! These tests drive a `SessionController` through whole sessions against the
//! in-process scripted service.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use guidance_session::api::{AssetResolver, ScriptedAssetResolver, ScriptedStepService};
use guidance_session::prefetch::{AssetPrefetcher, DEFAULT_PLACEHOLDER};
use guidance_session::session::{AdvanceOutcome, LifecycleState, SessionController, Step, Submission};
use guidance_session::config::Config;
use guidance_session::{InvalidationBus, Topic};

fn questionnaire(len: usize) -> ScriptedStepService {
    let steps = (0..len)
        .map(|i| Step::text(format!("q{}", i), format!("Question {}?", i), ["A", "B", "C"]))
        .collect();
    ScriptedStepService::new(steps)
}

fn controller(service: &Arc<ScriptedStepService>) -> SessionController {
    let prefetcher = AssetPrefetcher::new(Arc::new(ScriptedAssetResolver::new()));
    SessionController::new(service.clone(), prefetcher)
}

fn into_request(submission: Submission) -> guidance_session::api::AdvanceRequest {
    match submission {
        Submission::Request(request) => request,
        other => panic!("expected a request, got {:?}", other),
    }
}

/// Resolves labels starting with `slow` never; everything else immediately.
struct StallingResolver;

#[async_trait]
impl AssetResolver for StallingResolver {
    async fn resolve(&self, option_label: &str) -> guidance_session::Result<String> {
        if option_label.starts_with("slow") {
            std::future::pending::<()>().await;
        }
        Ok(format!("https://cdn.test/{}.png", option_label))
    }
}

/// Counts resolution calls and resolves every label.
#[derive(Default)]
struct CountingResolver {
    calls: AtomicUsize,
}

#[async_trait]
impl AssetResolver for CountingResolver {
    async fn resolve(&self, option_label: &str) -> guidance_session::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedAssetResolver::url_for(option_label))
    }
}

// ============================================================================
// Lifecycle Scenarios
// ============================================================================

#[tokio::test]
async fn test_fresh_session_goes_straight_to_active() {
    let service = Arc::new(questionnaire(10));
    let mut controller = controller(&service);

    assert_eq!(controller.initialize().await.unwrap(), LifecycleState::Active);

    let session = controller.session().unwrap();
    assert_eq!(session.current_index, 0);
    assert_eq!(session.total_steps, 10);
    assert_eq!(controller.history().len(), 1);
    assert_eq!(controller.visible_step().unwrap().id, "q0");
}

#[tokio::test]
async fn test_in_progress_session_resumes_without_network() {
    let service = Arc::new(questionnaire(10).with_answers(["A", "B", "C", "A", "B"]));
    let mut controller = controller(&service);

    assert_eq!(controller.initialize().await.unwrap(), LifecycleState::Landing);
    assert_eq!(controller.current_index(), 5);
    let calls = service.calls();

    controller.resume().await.unwrap();

    assert_eq!(controller.lifecycle(), LifecycleState::Active);
    assert_eq!(controller.history().current_index(), 5);
    assert_eq!(controller.history().len(), 6);
    assert_eq!(controller.visible_step().unwrap().id, "q5");
    assert_eq!(
        controller.history().get(3).unwrap().answer.as_deref(),
        Some("A")
    );
    assert_eq!(service.calls(), calls);
}

#[tokio::test]
async fn test_resume_on_image_step_resolves_only_option_media() {
    let service = Arc::new(
        ScriptedStepService::new(vec![
            Step::text("intro", "Ready?", ["Yes"]),
            Step::image("place", "Where would you work?", ["Lab", "Studio", "Ward"]),
        ])
        .with_answers(["Yes"]),
    );
    let resolver = Arc::new(CountingResolver::default());
    let prefetcher = AssetPrefetcher::new(resolver.clone());
    let mut controller = SessionController::new(service.clone(), prefetcher);

    assert_eq!(controller.initialize().await.unwrap(), LifecycleState::Landing);
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    let calls = service.calls();

    controller.resume().await.unwrap();

    // No step-service call; one media lookup per option of the current step.
    assert_eq!(service.calls(), calls);
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);
    let step = controller.visible_step().unwrap();
    assert_eq!(step.id, "place");
    assert_eq!(step.resolved_assets.as_ref().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_completed_session_restarts_fresh() {
    let service = Arc::new(questionnaire(4).completed());
    let bus = InvalidationBus::new();
    let mut events = bus.subscribe();
    let mut controller = controller(&service).with_invalidation_bus(bus);

    assert_eq!(controller.initialize().await.unwrap(), LifecycleState::Finished);

    assert_eq!(controller.restart().await.unwrap(), LifecycleState::Active);
    assert_eq!(service.calls().clear, 1);
    assert_eq!(controller.session().unwrap().current_index, 0);
    assert_eq!(controller.history().len(), 1);
    assert!(service.answers().is_empty());

    assert_eq!(events.recv().await.unwrap().topic, Topic::SessionProgress);
}

#[tokio::test]
async fn test_late_response_of_superseded_request_is_discarded() {
    let service = Arc::new(questionnaire(5));
    let mut controller = controller(&service);
    controller.initialize().await.unwrap();

    let t1 = into_request(controller.begin_answer("A").unwrap());
    let t2 = into_request(controller.begin_answer("B").unwrap());

    let (r1, r2) = tokio::join!(controller.dispatch(t1), controller.dispatch(t2));

    // T2 arrives first, T1 afterwards
    assert_eq!(
        controller.apply_advance(r2).await.unwrap(),
        AdvanceOutcome::Advanced { index: 1 }
    );
    assert_eq!(controller.apply_advance(r1).await.unwrap(), AdvanceOutcome::Stale);

    assert_eq!(controller.history().len(), 2);
    assert_eq!(
        controller.history().get(0).unwrap().answer.as_deref(),
        Some("B")
    );
    assert_eq!(controller.discarded_responses(), 1);
}

#[tokio::test]
async fn test_double_submission_applies_once() {
    let service = Arc::new(questionnaire(5));
    let mut controller = controller(&service);
    controller.initialize().await.unwrap();

    let first = into_request(controller.begin_answer("C").unwrap());
    let second = into_request(controller.begin_answer("C").unwrap());
    let (r1, r2) = tokio::join!(controller.dispatch(first), controller.dispatch(second));

    let outcomes = [
        controller.apply_advance(r1).await.unwrap(),
        controller.apply_advance(r2).await.unwrap(),
    ];

    let applied = outcomes
        .iter()
        .filter(|o| matches!(o, AdvanceOutcome::Advanced { .. }))
        .count();
    assert_eq!(applied, 1);
    assert_eq!(controller.history().len(), 2);
    assert!(!controller.has_pending_request());
}

// ============================================================================
// Editing
// ============================================================================

#[tokio::test]
async fn test_edit_truncates_and_regenerates() {
    let service = Arc::new(questionnaire(6));
    let mut controller = controller(&service);
    controller.initialize().await.unwrap();
    for answer in ["A", "B", "C"] {
        controller.submit(answer).await.unwrap();
    }
    assert_eq!(controller.history().len(), 4);

    controller.navigate_back().unwrap();
    controller.navigate_back().unwrap();
    assert_eq!(controller.history().current_index(), 1);
    assert_eq!(controller.selected_answer(), Some("B"));

    let edit = into_request(controller.begin_answer("A").unwrap());
    assert!(edit.is_edit);
    assert_eq!(controller.history().len(), 2);

    let completion = controller.dispatch(edit).await;
    assert_eq!(
        controller.apply_advance(completion).await.unwrap(),
        AdvanceOutcome::Advanced { index: 2 }
    );
    assert_eq!(controller.history().len(), 3);
    assert!(controller.history().get(2).unwrap().answer.is_none());
    assert_eq!(service.answers(), vec!["A", "A"]);
}

#[tokio::test]
async fn test_unchanged_edit_keeps_history() {
    let service = Arc::new(questionnaire(6));
    let mut controller = controller(&service);
    controller.initialize().await.unwrap();
    for answer in ["A", "B", "C"] {
        controller.submit(answer).await.unwrap();
    }

    controller.navigate_back().unwrap();
    controller.navigate_back().unwrap();
    let advances = service.calls().advance;

    assert_eq!(
        controller.submit("B").await.unwrap(),
        AdvanceOutcome::Navigated { index: 2 }
    );
    assert_eq!(controller.history().len(), 4);
    assert_eq!(service.calls().advance, advances);
}

// ============================================================================
// Prefetch
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_stalled_assets_fall_back_after_timeout() {
    let service = Arc::new(ScriptedStepService::new(vec![Step::image(
        "place",
        "Where would you work?",
        ["lab", "slow-studio", "ward", "slow-garage"],
    )]));
    let prefetcher = AssetPrefetcher::new(Arc::new(StallingResolver));
    let mut controller = SessionController::new(service, prefetcher);

    controller.initialize().await.unwrap();

    let step = controller.visible_step().unwrap();
    let assets = step.resolved_assets.as_ref().unwrap();
    assert_eq!(assets.len(), 4);
    assert_eq!(assets[0], "https://cdn.test/lab.png");
    assert_eq!(assets[1], DEFAULT_PLACEHOLDER);
    assert_eq!(assets[2], "https://cdn.test/ward.png");
    assert_eq!(assets[3], DEFAULT_PLACEHOLDER);
}

#[tokio::test]
async fn test_blank_configured_placeholder_still_reveals_step() {
    let mut config = Config::default();
    config.prefetch.placeholder_url = String::new();
    assert!(config.validate().is_err());

    let service = Arc::new(ScriptedStepService::new(vec![Step::image(
        "place",
        "Where would you work?",
        ["Lab", "Studio"],
    )]));
    let resolver = ScriptedAssetResolver::new().failing("Studio");
    let prefetcher = config.build_prefetcher(Arc::new(resolver));
    let mut controller = SessionController::new(service, prefetcher);

    assert_eq!(controller.initialize().await.unwrap(), LifecycleState::Active);
    let step = controller.visible_step().unwrap();
    assert_eq!(
        step.resolved_assets.as_deref().unwrap(),
        [ScriptedAssetResolver::url_for("Lab"), DEFAULT_PLACEHOLDER.to_string()]
    );
}

#[tokio::test]
async fn test_next_image_step_revealed_complete() {
    let service = Arc::new(ScriptedStepService::new(vec![
        Step::text("intro", "Ready?", ["Yes"]),
        Step::image("tools", "Pick a tool", ["Microscope", "Sketchbook"]),
    ]));
    let resolver = ScriptedAssetResolver::new().failing("Sketchbook");
    let prefetcher = AssetPrefetcher::new(Arc::new(resolver)).with_placeholder("/none.png");
    let mut controller = SessionController::new(service, prefetcher);
    controller.initialize().await.unwrap();

    controller.submit("Yes").await.unwrap();

    let step = controller.visible_step().unwrap();
    assert_eq!(
        step.resolved_assets.as_deref().unwrap(),
        [
            ScriptedAssetResolver::url_for("Microscope"),
            "/none.png".to_string()
        ]
    );
}

// ============================================================================
// Completion and Failures
// ============================================================================

#[tokio::test]
async fn test_full_demo_session() {
    let service = Arc::new(ScriptedStepService::demo());
    let bus = InvalidationBus::new();
    let mut events = bus.subscribe();
    let mut controller = controller(&service).with_invalidation_bus(bus);
    controller.initialize().await.unwrap();

    let mut insights = 0;
    loop {
        if controller.dismiss_insight().is_some() {
            insights += 1;
        }
        let answer = controller.visible_step().unwrap().options[0].clone();
        if controller.submit(answer).await.unwrap() == AdvanceOutcome::Finished {
            break;
        }
    }

    assert_eq!(controller.lifecycle(), LifecycleState::Finished);
    assert_eq!(insights, 1);
    assert_eq!(service.calls().analyze, 1);
    assert_eq!(events.recv().await.unwrap().topic, Topic::Results);

    let top = &controller.convergence().snapshot()[0];
    assert_eq!(top.label, "Investigative");
}

#[tokio::test]
async fn test_analysis_failure_is_not_surfaced() {
    let service = Arc::new(questionnaire(1));
    service.set_fail_analyze(true);
    let mut controller = controller(&service);
    controller.initialize().await.unwrap();

    assert_eq!(controller.submit("A").await.unwrap(), AdvanceOutcome::Finished);
    assert_eq!(controller.lifecycle(), LifecycleState::Finished);
    assert!(controller.advance_error().is_none());
}

#[tokio::test]
async fn test_advance_failure_preserves_step_and_answer() {
    let service = Arc::new(questionnaire(3));
    let mut controller = controller(&service);
    controller.initialize().await.unwrap();

    service.fail_next_advances(1);
    assert!(controller.submit("B").await.is_err());

    assert_eq!(controller.lifecycle(), LifecycleState::Active);
    assert_eq!(controller.visible_step().unwrap().id, "q0");
    assert_eq!(controller.selected_answer(), Some("B"));
    assert!(controller.advance_error().is_some());

    assert_eq!(
        controller.submit("B").await.unwrap(),
        AdvanceOutcome::Advanced { index: 1 }
    );
    assert!(controller.advance_error().is_none());
}

#[tokio::test]
async fn test_initialization_failure_leaves_no_partial_state() {
    let service = Arc::new(questionnaire(3));
    service.fail_next_inits(2);
    let mut controller = controller(&service);

    assert!(controller.initialize().await.is_err());
    assert_eq!(controller.lifecycle(), LifecycleState::Error);
    assert!(controller.history().is_empty());
    assert!(controller.session().is_none());

    assert!(controller.retry().await.is_err());
    assert_eq!(controller.retry().await.unwrap(), LifecycleState::Active);
    assert_eq!(service.calls().init, 3);
}
