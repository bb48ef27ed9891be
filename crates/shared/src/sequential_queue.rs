//! FIFO queue that runs async operations one at a time.
//!
//! A single worker task drains submitted thunks in call order. A thunk is only
//! invoked once the previous entry has settled. Failures, including panics,
//! are reported to the entry's own caller and the worker moves on.

use crate::{ErrorClass, ErrorCode, ErrorEnvelope, Result};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

type Job = BoxFuture<'static, ()>;

/// Serializes async operations in submission order.
#[derive(Debug, Clone)]
pub struct SequentialQueue {
    sender: mpsc::UnboundedSender<Job>,
    pending: Arc<AtomicUsize>,
}

impl SequentialQueue {
    /// Create a queue whose worker runs on the current tokio runtime.
    pub fn new() -> Result<Self> {
        let handle = Handle::try_current().map_err(|error| {
            ErrorEnvelope::invariant(
                ErrorCode::new("core", "runtime_unavailable"),
                format!("sequential queue requires a tokio runtime: {error}"),
            )
        })?;
        Ok(Self::with_handle(&handle))
    }

    /// Create a queue whose worker runs on `handle`.
    #[must_use]
    pub fn with_handle(handle: &Handle) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        handle.spawn(worker_loop(receiver, Arc::clone(&pending)));
        Self { sender, pending }
    }

    /// Entries queued or running.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Append `op` and resolve with its own outcome once it has run.
    ///
    /// The entry's position is fixed before this returns; `op` itself is not
    /// invoked until every earlier entry has settled.
    pub fn enqueue<T, F, Fut>(&self, op: F) -> impl Future<Output = Result<T>> + Send + use<T, F, Fut>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (reply, receiver) = oneshot::channel::<Result<T>>();
        let job: Job = Box::pin(async move {
            let outcome = AssertUnwindSafe(async move { op().await })
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(panic_error(&*payload)));
            if reply.send(outcome).is_err() {
                // Caller stopped waiting; nothing to do.
            }
        });

        self.pending.fetch_add(1, Ordering::SeqCst);
        let submitted = self.sender.send(job).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            closed_error()
        });

        async move {
            match submitted {
                Ok(()) => receiver.await.unwrap_or_else(|_| Err(closed_error())),
                Err(error) => Err(error),
            }
        }
    }
}

async fn worker_loop(mut receiver: mpsc::UnboundedReceiver<Job>, pending: Arc<AtomicUsize>) {
    while let Some(job) = receiver.recv().await {
        job.await;
        pending.fetch_sub(1, Ordering::SeqCst);
    }
}

fn closed_error() -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::new("core", "queue_closed"),
        "sequential queue worker is no longer running",
        ErrorClass::NonRetriable,
    )
}

fn panic_error(payload: &(dyn Any + Send)) -> ErrorEnvelope {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned());
    ErrorEnvelope::unexpected(
        ErrorCode::internal(),
        format!("queued operation panicked: {detail}"),
        ErrorClass::NonRetriable,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    fn log() -> Arc<Mutex<Vec<u32>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn entries(log: &Mutex<Vec<u32>>) -> Vec<u32> {
        log.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    #[tokio::test(start_paused = true)]
    async fn runs_in_submission_order_regardless_of_duration() -> Result<()> {
        let queue = SequentialQueue::new()?;
        let log = log();

        let futures: Vec<_> = [(1u32, 30u64), (2, 5), (3, 15)]
            .into_iter()
            .map(|(value, delay_ms)| {
                let log = Arc::clone(&log);
                queue.enqueue(move || async move {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    log.lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .push(value);
                    Ok(value)
                })
            })
            .collect();

        let results = futures_util::future::join_all(futures).await;
        assert_eq!(entries(&log), vec![1, 2, 3]);
        assert!(matches!(results.as_slice(), [Ok(1), Ok(2), Ok(3)]));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn entries_never_overlap() -> Result<()> {
        let queue = SequentialQueue::new()?;
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let futures: Vec<_> = (0..5u64)
            .map(|index| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                queue.enqueue(move || async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10 - index)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .collect();

        futures_util::future::join_all(futures).await;
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn failure_is_isolated_to_its_caller() -> Result<()> {
        let queue = SequentialQueue::new()?;
        let log = log();

        let record = |value: u32| {
            let log = Arc::clone(&log);
            move || async move {
                log.lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .push(value);
                Ok(value)
            }
        };

        let first = queue.enqueue(record(1));
        let second = queue.enqueue(|| async {
            Err::<u32, _>(ErrorEnvelope::remote(
                "not-found",
                "session missing",
                ErrorClass::NonRetriable,
            ))
        });
        let third = queue.enqueue(record(3));

        let (first, second, third) = tokio::join!(first, second, third);
        assert_eq!(first?, 1);
        assert!(matches!(second, Err(ref e) if e.message == "session missing"));
        assert_eq!(third?, 3);
        assert_eq!(entries(&log), vec![1, 3]);
        Ok(())
    }

    #[tokio::test]
    #[allow(clippy::panic, reason = "exercises panic isolation in the worker")]
    async fn panic_is_reported_and_worker_continues() -> Result<()> {
        let queue = SequentialQueue::new()?;

        let exploding = queue.enqueue(|| async {
            if true {
                panic!("boom");
            }
            Ok(0u32)
        });
        let after = queue.enqueue(|| async { Ok(5u32) });

        let exploding = exploding.await;
        assert!(matches!(exploding, Err(ref e) if e.code == ErrorCode::internal()));
        if let Err(error) = exploding {
            assert!(error.message.contains("boom"));
        }
        assert_eq!(after.await?, 5);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn idle_queue_starts_immediately_and_tracks_pending() -> Result<()> {
        let queue = SequentialQueue::new()?;
        let started = Instant::now();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let blocked = queue.enqueue(move || async move {
            let begun = started.elapsed();
            let _ = release_rx.await;
            Ok(begun)
        });
        let follower = queue.enqueue(|| async { Ok(Duration::ZERO) });
        assert_eq!(queue.pending(), 2);

        let blocked = tokio::spawn(blocked);
        tokio::task::yield_now().await;
        let _ = release_tx.send(());

        let begun = blocked.await.expect("join")?;
        assert_eq!(begun, Duration::ZERO);
        follower.await?;
        tokio::task::yield_now().await;
        assert_eq!(queue.pending(), 0);
        Ok(())
    }

    #[test]
    fn new_requires_runtime() {
        assert!(SequentialQueue::new().is_err());
    }
}
