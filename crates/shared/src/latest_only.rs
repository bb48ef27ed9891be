//! Latest-only result gate.
//!
//! Each call receives a sequence id at call time. When its operation settles
//! the result is accepted only if that id is greater than the highest id
//! accepted so far; acceptance raises the recorded id. Completion order, not
//! start order, picks the winner, and once an id has been accepted no lower id
//! can be accepted afterwards.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Gate that discards results from calls overtaken by a newer accepted call.
#[derive(Debug, Clone, Default)]
pub struct LatestOnlyGate {
    counters: Arc<GateCounters>,
}

#[derive(Debug, Default)]
struct GateCounters {
    latest_id: AtomicU64,
    completed_id: AtomicU64,
}

impl LatestOnlyGate {
    /// Create a gate with no calls recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest id handed out so far.
    #[must_use]
    pub fn latest_id(&self) -> u64 {
        self.counters.latest_id.load(Ordering::SeqCst)
    }

    /// Highest id whose result was accepted.
    #[must_use]
    pub fn completed_id(&self) -> u64 {
        self.counters.completed_id.load(Ordering::SeqCst)
    }

    /// Run `op` and yield its result only if no newer call was accepted first.
    ///
    /// The id is assigned and `op` is invoked before this returns.
    pub fn execute<T, F, Fut>(&self, op: F) -> impl Future<Output = Option<T>> + use<T, F, Fut>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let id = self.next_id();
        let counters = Arc::clone(&self.counters);
        let fut = op();

        async move {
            let value = fut.await;
            counters.accept(id).then_some(value)
        }
    }

    /// Fallible variant of [`LatestOnlyGate::execute`].
    ///
    /// A failure from a call that is already stale resolves to `Ok(None)`. A
    /// failure from a current call is returned and does not advance the
    /// accepted id, so earlier calls still in flight may still win.
    pub fn try_execute<T, E, F, Fut>(
        &self,
        op: F,
    ) -> impl Future<Output = Result<Option<T>, E>> + use<T, E, F, Fut>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let id = self.next_id();
        let counters = Arc::clone(&self.counters);
        let fut = op();

        async move {
            match fut.await {
                Ok(value) => Ok(counters.accept(id).then_some(value)),
                Err(_) if counters.is_stale(id) => Ok(None),
                Err(error) => Err(error),
            }
        }
    }

    fn next_id(&self) -> u64 {
        self.counters
            .latest_id
            .fetch_add(1, Ordering::SeqCst)
            .saturating_add(1)
    }
}

impl GateCounters {
    fn accept(&self, id: u64) -> bool {
        self.completed_id.fetch_max(id, Ordering::SeqCst) < id
    }

    fn is_stale(&self, id: u64) -> bool {
        self.completed_id.load(Ordering::SeqCst) >= id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorClass, ErrorEnvelope};
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn later_call_finishing_first_wins() {
        let gate = LatestOnlyGate::new();
        let (first_tx, first_rx) = oneshot::channel::<&str>();
        let (second_tx, second_rx) = oneshot::channel::<&str>();

        let first = tokio::spawn(gate.execute(move || async move { first_rx.await.ok() }));
        let second = tokio::spawn(gate.execute(move || async move { second_rx.await.ok() }));
        assert_eq!(gate.latest_id(), 2);

        let _ = second_tx.send("second");
        let second = second.await.expect("join");
        assert_eq!(second, Some(Some("second")));

        let _ = first_tx.send("first");
        let first = first.await.expect("join");
        assert_eq!(first, None);
        assert_eq!(gate.completed_id(), 2);
    }

    #[tokio::test]
    async fn sequential_calls_are_all_accepted() {
        let gate = LatestOnlyGate::new();
        for value in 1..=3u32 {
            let accepted = gate.execute(move || async move { value }).await;
            assert_eq!(accepted, Some(value));
        }
        assert_eq!(gate.completed_id(), 3);
        assert!(gate.completed_id() <= gate.latest_id());
    }

    #[tokio::test]
    async fn ids_are_assigned_at_call_time() {
        let gate = LatestOnlyGate::new();
        let older = gate.execute(|| async { "older" });
        let newer = gate.execute(|| async { "newer" });

        // Poll the newer call first; the older one is then stale.
        assert_eq!(newer.await, Some("newer"));
        assert_eq!(older.await, None);
    }

    #[tokio::test]
    async fn fresh_failure_propagates_without_advancing() {
        let gate = LatestOnlyGate::new();
        let older = gate.try_execute(|| async { Ok::<_, ErrorEnvelope>("older") });
        let newer = gate.try_execute(|| async {
            Err::<&str, _>(ErrorEnvelope::remote(
                "unavailable",
                "down",
                ErrorClass::Retriable,
            ))
        });

        assert!(newer.await.is_err());
        assert_eq!(gate.completed_id(), 0);
        assert_eq!(older.await, Ok(Some("older")));
    }

    #[tokio::test]
    async fn stale_failure_is_discarded() {
        let gate = LatestOnlyGate::new();
        let older = gate.try_execute(|| async {
            Err::<&str, _>(ErrorEnvelope::remote(
                "unavailable",
                "down",
                ErrorClass::Retriable,
            ))
        });
        let newer = gate.try_execute(|| async { Ok::<_, ErrorEnvelope>("newer") });

        assert_eq!(newer.await, Ok(Some("newer")));
        assert_eq!(older.await, Ok(None));
    }
}
