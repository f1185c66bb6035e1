//! Bounded-time prefetching of per-option media.
//!
//! Image steps are only revealed once every option has a media reference.
//! References are resolved concurrently and the batch races one global
//! timeout:
//! - options resolved in time keep their real reference
//! - failed or late options get a fixed placeholder
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use guidance_session::api::ScriptedAssetResolver;
//! use guidance_session::prefetch::AssetPrefetcher;
//! use guidance_session::session::Step;
//!
//! # async fn demo() {
//! let prefetcher = AssetPrefetcher::new(Arc::new(ScriptedAssetResolver::new()))
//!     .with_timeout(Duration::from_secs(25));
//!
//! let mut step = Step::image("q3", "Where would you rather work?", ["Lab", "Studio"]);
//! prefetcher.resolve(&mut step).await;
//! assert_eq!(step.resolved_assets.map(|a| a.len()), Some(2));
//! # }
//! ```

mod prefetcher;
mod race;
mod timer;

pub use prefetcher::{AssetPrefetcher, PrefetchReport, DEFAULT_PLACEHOLDER, DEFAULT_PREFETCH_TIMEOUT};
pub use race::{all_settled, first_of, settle_within, First, Settled};
pub use timer::{ManualTimer, Timer, TokioTimer};
