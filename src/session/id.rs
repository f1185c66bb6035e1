//! Session identifiers and request tokens.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Global counter for request token generation.
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifier of a test session, as assigned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a server-assigned identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque token attached to every state-advancing request.
///
/// The remote service echoes it back unchanged. Tokens are displayed as
/// `req-XXXXXXXX-<uuid>`: the counter keeps them ordered within one process,
/// the UUID keeps them unique across processes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestToken(String);

impl RequestToken {
    /// Mint a new unique token.
    pub fn mint() -> Self {
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("req-{:08x}-{}", seq, Uuid::new_v4().simple()))
    }

    /// Wrap a token received over the wire.
    pub fn from_raw(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the raw token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
