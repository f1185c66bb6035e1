//! Token gate for state-advancing requests.

use super::RequestToken;

/// Discards responses to anything but the most recently issued request.
///
/// The gate holds one "latest" cell: the token of the newest request and the
/// context it was dispatched with. A response is authoritative only if its
/// echoed token matches that cell; accepting consumes the cell, so a
/// duplicate delivery of the same response is stale as well. Superseded
/// requests are not aborted, their responses are ignored on arrival.
#[derive(Debug)]
pub struct RequestGate<C> {
    latest: Option<(RequestToken, C)>,
    accepted: Option<RequestToken>,
    issued: u64,
    discarded: u64,
}

impl<C> RequestGate<C> {
    /// Create a gate with nothing in flight.
    pub fn new() -> Self {
        Self {
            latest: None,
            accepted: None,
            issued: 0,
            discarded: 0,
        }
    }

    /// Mint a token for a new request; it supersedes any earlier one.
    pub fn issue(&mut self, context: C) -> RequestToken {
        let token = RequestToken::mint();
        self.latest = Some((token.clone(), context));
        self.issued += 1;
        token
    }

    /// Check whether `token` is the latest issued and not yet settled.
    pub fn is_latest(&self, token: &RequestToken) -> bool {
        matches!(&self.latest, Some((latest, _)) if latest == token)
    }

    /// Whether an authoritative request is outstanding.
    pub fn has_pending(&self) -> bool {
        self.latest.is_some()
    }

    /// Accept a response echoing `token`.
    ///
    /// Returns the dispatch context if the response is authoritative, `None`
    /// if it is stale.
    pub fn accept(&mut self, token: &RequestToken) -> Option<C> {
        if !self.is_latest(token) {
            self.discarded += 1;
            return None;
        }
        let (token, context) = self.latest.take()?;
        self.accepted = Some(token);
        Some(context)
    }

    /// Settle the latest request as failed.
    ///
    /// Returns the dispatch context if `token` was the latest, `None` if the
    /// failure belongs to a superseded request.
    pub fn reject(&mut self, token: &RequestToken) -> Option<C> {
        if !self.is_latest(token) {
            self.discarded += 1;
            return None;
        }
        self.latest.take().map(|(_, context)| context)
    }

    /// Forget the outstanding request so every in-flight response is stale.
    pub fn invalidate(&mut self) {
        self.latest = None;
    }

    /// Token of the last accepted response.
    pub fn latest_accepted(&self) -> Option<&RequestToken> {
        self.accepted.as_ref()
    }

    /// Number of tokens issued so far.
    pub fn issued_count(&self) -> u64 {
        self.issued
    }

    /// Number of responses discarded as stale.
    pub fn discarded_count(&self) -> u64 {
        self.discarded
    }
}

impl<C> Default for RequestGate<C> {
    fn default() -> Self {
        Self::new()
    }
}
