//! Request-scoped cancellation and deadline

use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Carries the caller's cancellation signal and optional deadline into every
/// rule and RPC call made on behalf of one request.
///
/// Cloning shares the same token. [`RequestContext::child`] derives a context
/// that is cancelled together with its parent but can also be cancelled on its
/// own, which is how a short-circuited policy stops its remaining rules.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Unbounded context with a fresh token
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Context that expires at `deadline`
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Derive a child sharing this deadline; cancelling the child leaves the parent untouched
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context and every child derived from it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether this context or an ancestor was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the context is cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Absolute deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Clamp a per-call budget to whatever the deadline still allows
    pub fn budget(&self, per_call: Duration) -> Duration {
        match self.remaining() {
            Some(remaining) => remaining.min(per_call),
            None => per_call,
        }
    }
}
