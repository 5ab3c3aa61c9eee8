//! Cancellation and deadlines for store mutations.
//!
//! A mutation checks its [`OperationContext`] between statements. When the
//! context reports cancellation or an expired deadline, the mutation returns
//! early and its open transaction is dropped, which rolls it back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{StoreError, StoreResult};

/// Shared flag used to cancel an in-flight operation from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// True once [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Per-call cancellation token and optional deadline.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    token: CancellationToken,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    #[cfg(test)]
    trip_after: Option<Arc<std::sync::atomic::AtomicUsize>>,
}

impl OperationContext {
    /// A context that never cancels or expires.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a deadline `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Like [`with_timeout`](Self::with_timeout) but accepts `None`.
    pub fn with_optional_timeout(self, timeout: Option<Duration>) -> Self {
        match timeout {
            Some(timeout) => self.with_timeout(timeout),
            None => self,
        }
    }

    /// Uses an existing token so the caller can cancel from elsewhere.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// The context's cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Cancels the token once `passes` checkpoints have gone by.
    #[cfg(test)]
    pub(crate) fn cancel_after_checkpoints(mut self, passes: usize) -> Self {
        self.trip_after = Some(Arc::new(std::sync::atomic::AtomicUsize::new(passes)));
        self
    }

    /// Fails with `Cancelled` or `Timeout` when the operation must stop.
    pub fn checkpoint(&self) -> StoreResult<()> {
        #[cfg(test)]
        if let Some(remaining) = &self.trip_after {
            if remaining.load(Ordering::SeqCst) == 0 {
                self.token.cancel();
            } else {
                remaining.fetch_sub(1, Ordering::SeqCst);
            }
        }
        match self.interrupted() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// The error the operation must stop with, if any. Unlike
    /// [`checkpoint`](Self::checkpoint) this only observes, so waits can
    /// poll it freely.
    pub(crate) fn interrupted(&self) -> Option<StoreError> {
        if self.token.is_cancelled() {
            return Some(StoreError::Cancelled);
        }
        match (self.deadline, self.timeout) {
            (Some(deadline), Some(timeout)) if Instant::now() >= deadline => {
                Some(StoreError::Timeout(timeout))
            }
            _ => None,
        }
    }
}
