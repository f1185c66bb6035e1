//! Cross-view invalidation events.
//!
//! Views that display data derived from the test session (dashboards,
//! result pages) subscribe here and re-fetch when a topic they care about is
//! invalidated.

use tokio::sync::broadcast;
use tracing::trace;

/// Default capacity of the event buffer per subscriber.
const CHANNEL_CAPACITY: usize = 32;

/// What became stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Session progress changed (restart, clear).
    SessionProgress,
    /// A session completed and new results are available.
    Results,
}

/// One invalidation event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub topic: Topic,
    /// Session the event refers to, if any.
    pub session_id: Option<String>,
}

/// Publish/subscribe channel for invalidation events.
///
/// Cloning yields another handle to the same channel.
#[derive(Debug, Clone)]
pub struct InvalidationBus {
    sender: broadcast::Sender<Invalidation>,
}

impl InvalidationBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event; returns how many subscribers received it.
    pub fn publish(&self, topic: Topic, session_id: Option<&str>) -> usize {
        let event = Invalidation {
            topic,
            session_id: session_id.map(str::to_string),
        };
        trace!(?topic, "publishing invalidation");
        // No subscribers is not an error.
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to every future event.
    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.sender.subscribe()
    }
}

impl Default for InvalidationBus {
    fn default() -> Self {
        Self::new()
    }
}
