//! # guidance-session
//!
//! Client-side engine for an adaptive career-guidance test.
//!
//! A remote service generates each question from the answers given so far.
//! This crate drives one student through that questionnaire: it tracks the
//! session lifecycle, keeps a navigable and editable answer history, makes
//! sure only the latest in-flight request can move the session forward,
//! preloads option media for image questions, and accumulates the semantic
//! weights the service reports along the way.
//!
//! ## Features
//!
//! - **Explicit lifecycle**: `Loading`, `Landing`, `Active`, `Finished`, `Error`
//! - **Editable history**: changing an earlier answer discards what followed it
//! - **Idempotent advances**: stale responses are dropped, never applied
//! - **Atomic media prefetch**: image steps are shown complete or not at all
//! - **Pluggable transport**: HTTP client or an in-process scripted service
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use guidance_session::api::{ScriptedAssetResolver, ScriptedStepService};
//! use guidance_session::prefetch::AssetPrefetcher;
//! use guidance_session::SessionController;
//!
//! #[tokio::main]
//! async fn main() -> guidance_session::Result<()> {
//!     // Initialize logging
//!     guidance_session::logging::try_init().ok();
//!
//!     let prefetcher = AssetPrefetcher::new(Arc::new(ScriptedAssetResolver::new()));
//!     let mut controller =
//!         SessionController::new(Arc::new(ScriptedStepService::demo()), prefetcher);
//!
//!     controller.initialize().await?;
//!     let first = controller.visible_step().map(|s| s.options[0].clone());
//!     if let Some(answer) = first {
//!         controller.submit(answer).await?;
//!     }
//!
//!     println!("now at step {}", controller.history().current_index());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod insight;
pub mod logging;
pub mod notify;
pub mod prefetch;
pub mod session;

// Re-export commonly used types
pub use api::{AssetResolver, HttpStepService, StepService};
pub use config::Config;
pub use driver::TerminalDriver;
pub use error::{GuidanceError, Result};
pub use insight::{ConvergenceTracker, TransitionInsight, TransitionInsightPresenter};
pub use notify::{Invalidation, InvalidationBus, Topic};
pub use prefetch::AssetPrefetcher;
pub use session::{
    AdvanceOutcome, LifecycleState, RequestGate, Session, SessionController, SessionId, Step,
    StepHistory,
};
