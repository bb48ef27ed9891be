//! Cooperative cancellation token.
//!
//! A `CancelToken` is a clonable handle over a single shared flag. Once
//! cancelled it stays cancelled; the first recorded reason is kept. Guarded
//! operations poll it with [`CancelToken::throw_if_cancelled`] before starting
//! work and after every await point. The token never interrupts I/O on its
//! own; it only tells the caller to discard what it was doing.

use crate::{ErrorEnvelope, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

/// Default message used when a token is cancelled without a reason.
pub const DEFAULT_CANCEL_MESSAGE: &str = "operation cancelled";

/// A clonable cancellation token that can be polled or awaited.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    reason: Mutex<Option<Box<str>>>,
    notify: Notify,
}

impl CancelToken {
    /// Create a new token in the non-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the token without a reason.
    pub fn cancel(&self) {
        self.cancel_inner(None);
    }

    /// Cancel the token and record `reason` if this is the first cancellation.
    pub fn cancel_with_reason(&self, reason: impl Into<String>) {
        self.cancel_inner(Some(reason.into().into_boxed_str()));
    }

    fn cancel_inner(&self, reason: Option<Box<str>>) {
        {
            let mut slot = self
                .inner
                .reason
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if self.inner.cancelled.load(Ordering::SeqCst) {
                return;
            }
            *slot = reason;
            self.inner.cancelled.store(true, Ordering::SeqCst);
        }
        self.inner.notify.notify_waiters();
    }

    /// Returns true once the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Reason recorded by the first cancellation, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.inner
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
            .map(str::to_owned)
    }

    /// Fail with a cancellation envelope when the token is cancelled.
    ///
    /// The envelope carries the reason both as its message and as the
    /// `reason` metadata entry.
    pub fn throw_if_cancelled(&self) -> Result<()> {
        if !self.is_cancelled() {
            return Ok(());
        }
        Err(self.cancellation_error())
    }

    /// Build the cancellation envelope for this token.
    #[must_use]
    pub fn cancellation_error(&self) -> ErrorEnvelope {
        match self.reason() {
            Some(reason) => ErrorEnvelope::cancelled(reason.clone()).with_metadata("reason", reason),
            None => ErrorEnvelope::cancelled(DEFAULT_CANCEL_MESSAGE),
        }
    }

    /// Wait until the token is cancelled.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }

        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
            if self.is_cancelled() {
                return;
            }
        }
    }
}
