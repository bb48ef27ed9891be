//! Trailing-edge debouncer.
//!
//! Every [`Debouncer::call`] replaces whatever call is still waiting for its
//! timer: the earlier caller receives a `core:superseded` error and its timer
//! task is aborted. Only the last call of a burst runs the wrapped function,
//! once, `delay` after that call. A call whose timer already fired runs to
//! completion even if newer calls arrive meanwhile.

use crate::{ErrorClass, ErrorCode, ErrorEnvelope, Result};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

type DebouncedFn<A, T> = dyn Fn(A) -> BoxFuture<'static, Result<T>> + Send + Sync;

/// Wraps an async function so that only the latest call in a burst runs.
pub struct Debouncer<A, T> {
    inner: Arc<DebounceInner<A, T>>,
}

impl<A, T> Clone for Debouncer<A, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, T> fmt::Debug for Debouncer<A, T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Debouncer")
            .field("delay", &self.inner.delay)
            .field("pending", &self.has_pending())
            .finish_non_exhaustive()
    }
}

struct DebounceInner<A, T> {
    func: Box<DebouncedFn<A, T>>,
    delay: Duration,
    handle: Handle,
    state: Mutex<DebounceState<T>>,
}

struct DebounceState<T> {
    next_generation: u64,
    pending: Option<PendingCall<T>>,
}

struct PendingCall<T> {
    generation: u64,
    timer: JoinHandle<()>,
    reply: oneshot::Sender<Result<T>>,
}

impl<A, T> Debouncer<A, T>
where
    A: Send + 'static,
    T: Send + 'static,
{
    /// Create a debouncer bound to the current tokio runtime.
    pub fn new<F, Fut>(func: F, delay: Duration) -> Result<Self>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let handle = Handle::try_current().map_err(|error| {
            ErrorEnvelope::invariant(
                ErrorCode::new("core", "runtime_unavailable"),
                format!("debouncer requires a tokio runtime: {error}"),
            )
        })?;
        Ok(Self::with_handle(handle, func, delay))
    }

    /// Create a debouncer that schedules its timers on `handle`.
    pub fn with_handle<F, Fut>(handle: Handle, func: F, delay: Duration) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            inner: Arc::new(DebounceInner {
                func: Box::new(move |args| func(args).boxed()),
                delay,
                handle,
                state: Mutex::new(DebounceState {
                    next_generation: 0,
                    pending: None,
                }),
            }),
        }
    }

    /// Configured trailing delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Schedule `args` and supersede any call still waiting for its timer.
    ///
    /// Registration happens before this returns, so the returned future may be
    /// awaited later without affecting ordering.
    pub fn call(&self, args: A) -> impl Future<Output = Result<T>> + Send + 'static {
        let (reply, receiver) = oneshot::channel();

        {
            let mut state = self.lock_state();
            if let Some(previous) = state.pending.take() {
                reject(previous, ErrorEnvelope::superseded("superseded by a newer call"));
            }

            let generation = state.next_generation;
            state.next_generation = state.next_generation.wrapping_add(1);

            let inner = Arc::clone(&self.inner);
            let timer = self.inner.handle.spawn(async move {
                tokio::time::sleep(inner.delay).await;
                fire(&inner, generation, args).await;
            });

            state.pending = Some(PendingCall {
                generation,
                timer,
                reply,
            });
        }

        receiver.map(|outcome| {
            outcome.unwrap_or_else(|_| {
                Err(ErrorEnvelope::unexpected(
                    ErrorCode::internal(),
                    "debounced call dropped before completing",
                    ErrorClass::NonRetriable,
                ))
            })
        })
    }

    /// Reject the waiting call, if any, with a cancellation error.
    pub fn cancel(&self) {
        let previous = self.lock_state().pending.take();
        if let Some(previous) = previous {
            reject(previous, ErrorEnvelope::cancelled("debounced call cancelled"));
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, DebounceState<T>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<A, T> Debouncer<A, T> {
    /// Returns true while a call is waiting for its timer.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .is_some()
    }
}

fn reject<T>(call: PendingCall<T>, error: ErrorEnvelope) {
    call.timer.abort();
    if call.reply.send(Err(error)).is_err() {
        // Caller stopped waiting; nothing to do.
    }
}

async fn fire<A, T>(inner: &DebounceInner<A, T>, generation: u64, args: A) {
    let reply = {
        let mut state = inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.pending.take() {
            Some(call) if call.generation == generation => call.reply,
            other => {
                state.pending = other;
                return;
            },
        }
    };

    let outcome = (inner.func)(args).await;
    if reply.send(outcome).is_err() {
        // Caller stopped waiting; nothing to do.
    }
}
