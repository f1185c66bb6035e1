//! Remote collaborators of the session engine.
//!
//! The engine talks to two ports:
//! - [`StepService`]: session initialization, clearing, step advance and the
//!   final analysis call
//! - [`AssetResolver`]: per-option media resolution for image steps
//!
//! [`HttpStepService`] implements both over HTTP/JSON. The scripted
//! implementations serve a fixed questionnaire in-process.
//!
//! ## Endpoints used by `HttpStepService`
//!
//! - `POST /test/session` - Initialize or fetch the session
//! - `POST /test/session/clear` - Destroy the session
//! - `POST /test/step` - Submit an answer, receive the next step
//! - `POST /test/option-image` - Resolve one option's media
//! - `POST /test/analyze` - Request the final analysis

pub mod client;
pub mod scripted;
pub mod types;

pub use client::{AssetResolver, HttpStepService, StepService};
pub use scripted::{CallCounts, ScriptedAssetResolver, ScriptedStepService};
pub use types::{
    Ack, AdvanceRequest, AdvanceResponse, AssetRequest, AssetResponse, InitSessionResponse,
    SessionRequest,
};
