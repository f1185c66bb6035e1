//! Injectable timers for bounded waits.

use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::watch;

/// Source of sleep futures.
pub trait Timer: Send + Sync {
    /// A future that completes once `duration` has elapsed.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Wall-clock timer backed by `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Timer that only fires when told to.
///
/// Every sleep created from it, before or after the call, completes once
/// `fire` has been called. The requested duration is ignored.
#[derive(Debug)]
pub struct ManualTimer {
    fired: watch::Sender<bool>,
}

impl ManualTimer {
    /// Create an unfired timer.
    pub fn new() -> Self {
        let (fired, _) = watch::channel(false);
        Self { fired }
    }

    /// Complete every pending and future sleep.
    pub fn fire(&self) {
        self.fired.send_replace(true);
    }

    /// Whether `fire` has been called.
    pub fn has_fired(&self) -> bool {
        *self.fired.borrow()
    }
}

impl Default for ManualTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for ManualTimer {
    fn sleep(&self, _duration: Duration) -> BoxFuture<'static, ()> {
        let mut rx = self.fired.subscribe();
        Box::pin(async move {
            loop {
                let fired = *rx.borrow_and_update();
                if fired {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Timer dropped without firing: never completes.
                    std::future::pending::<()>().await;
                }
            }
        })
    }
}
