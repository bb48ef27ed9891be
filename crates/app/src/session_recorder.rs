//! Ordered persistence of a practice conversation.
//!
//! State transitions are applied synchronously and each resulting snapshot
//! is queued on a [`SequentialQueue`], so the stored session document always
//! reflects the latest transition even when writes complete slowly.

use crate::events::fields;
use rehearse_domain::{
    ConversationState, ConversationStatus, SESSIONS_COLLECTION, ScenarioId, SessionId,
    SessionRecord, Speaker, TurnRecord, UserId,
};
use rehearse_ports::{BoxFuture, DocumentKey, DocumentStorePort, LoggerPort, WriteMode};
use rehearse_shared::{
    ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result, SequentialQueue,
};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Input payload for starting a session.
#[derive(Debug, Clone)]
pub struct StartSessionInput {
    /// Owner of the session.
    pub user_id: UserId,
    /// Scenario being practised.
    pub scenario_id: ScenarioId,
    /// Turn limit.
    pub max_turns: u32,
}

/// Dependencies required by the session recorder.
#[derive(Clone)]
pub struct SessionRecorderDeps {
    /// Document store receiving session snapshots.
    pub documents: Arc<dyn DocumentStorePort>,
    /// Write queue, shared with evaluation persistence.
    pub queue: SequentialQueue,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
}

/// Records one conversation. Clones share the same session.
#[derive(Clone)]
pub struct SessionRecorder {
    deps: SessionRecorderDeps,
    record: Arc<Mutex<SessionRecord>>,
}

impl SessionRecorder {
    /// Create a session and store its first snapshot.
    pub async fn start(
        ctx: &RequestContext,
        deps: SessionRecorderDeps,
        input: StartSessionInput,
    ) -> Result<Self> {
        let state = ConversationState::new(input.max_turns).map_err(ErrorEnvelope::from)?;
        let record = SessionRecord::start(
            SessionId::generate(),
            input.user_id,
            input.scenario_id,
            state,
            now_epoch_ms(),
        );
        if let Some(logger) = deps.logger.as_ref() {
            logger.info(
                "app.session.started",
                "Practice session started",
                Some(fields([
                    ("sessionId", Value::from(record.session_id.as_str())),
                    ("scenarioId", Value::from(record.scenario_id.as_str())),
                    ("maxTurns", Value::from(input.max_turns)),
                ])),
            );
        }

        let recorder = Self {
            deps,
            record: Arc::new(Mutex::new(record)),
        };
        recorder.transition(ctx, |_| Ok(())).await?;
        Ok(recorder)
    }

    /// Session identifier.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.lock().session_id.clone()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ConversationStatus {
        self.lock().state.status()
    }

    /// Copy of the in-memory record.
    #[must_use]
    pub fn snapshot(&self) -> SessionRecord {
        self.lock().clone()
    }

    /// Append a turn and resolve with the new turn count once stored.
    ///
    /// Closed conversations reject the turn before anything is queued.
    pub fn record_turn(
        &self,
        ctx: &RequestContext,
        speaker: Speaker,
        text: &str,
    ) -> BoxFuture<'static, Result<u32>> {
        let text: Box<str> = text.into();
        let mut turn_count = 0;
        let write = self.transition(ctx, |record| {
            turn_count = record.state.record_turn().map_err(ErrorEnvelope::from)?;
            record.turns.push(TurnRecord {
                speaker,
                text,
                at_ms: now_epoch_ms(),
            });
            Ok(())
        });
        Box::pin(async move {
            write.await?;
            Ok(turn_count)
        })
    }

    /// Mark the session as timed out.
    pub fn mark_timed_out(&self, ctx: &RequestContext) -> BoxFuture<'static, Result<()>> {
        self.transition(ctx, |record| {
            record.state.mark_timed_out();
            Ok(())
        })
    }

    /// Mark the session as exited by the user.
    pub fn exit(&self, ctx: &RequestContext) -> BoxFuture<'static, Result<()>> {
        self.transition(ctx, |record| {
            record.state.exit();
            Ok(())
        })
    }

    /// Resolve once every write queued so far has settled.
    pub async fn flush(&self) -> Result<()> {
        self.deps.queue.enqueue(|| async { Ok(()) }).await
    }

    /// Apply `update` and queue the resulting snapshot under the same lock,
    /// so queue order matches transition order.
    fn transition(
        &self,
        ctx: &RequestContext,
        update: impl FnOnce(&mut SessionRecord) -> Result<()>,
    ) -> BoxFuture<'static, Result<()>> {
        let queued = {
            let mut record = self.lock();
            update(&mut record).and_then(|()| {
                let data = snapshot_value(&record)?;
                let key = DocumentKey::new(SESSIONS_COLLECTION, record.session_id.as_str());
                Ok(self.enqueue_write(ctx, key, data))
            })
        };
        let logger = self.deps.logger.clone();

        Box::pin(async move {
            let result = match queued {
                Ok(write) => write.await,
                Err(error) => Err(error),
            };
            if let (Err(error), Some(logger)) = (&result, logger.as_ref()) {
                logger.error(
                    "app.session.writeFailed",
                    "Session update was not stored",
                    error,
                    None,
                );
            }
            result
        })
    }

    fn enqueue_write(
        &self,
        ctx: &RequestContext,
        key: DocumentKey,
        data: Value,
    ) -> BoxFuture<'static, Result<()>> {
        let documents = Arc::clone(&self.deps.documents);
        let ctx = ctx.clone();
        Box::pin(self.deps.queue.enqueue(move || async move {
            documents.set(&ctx, key, data, WriteMode::Replace).await
        }))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn snapshot_value(record: &SessionRecord) -> Result<Value> {
    serde_json::to_value(record).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            format!("failed to serialize session: {error}"),
            ErrorClass::NonRetriable,
        )
    })
}

fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|duration| u64::try_from(duration.as_millis()).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rehearse_adapters::InMemoryDocumentStore;
    use std::time::Duration;

    fn start_input(max_turns: u32) -> Result<StartSessionInput> {
        Ok(StartSessionInput {
            user_id: UserId::parse("user_1").map_err(ErrorEnvelope::from)?,
            scenario_id: ScenarioId::parse("budget-pushback").map_err(ErrorEnvelope::from)?,
            max_turns,
        })
    }

    fn deps(documents: Arc<dyn DocumentStorePort>) -> Result<SessionRecorderDeps> {
        Ok(SessionRecorderDeps {
            documents,
            queue: SequentialQueue::new()?,
            logger: None,
        })
    }

    async fn stored_turns(
        store: &InMemoryDocumentStore,
        ctx: &RequestContext,
        session_id: &SessionId,
    ) -> Result<Option<usize>> {
        let stored = store
            .get(ctx, DocumentKey::new(SESSIONS_COLLECTION, session_id.as_str()))
            .await?;
        Ok(stored
            .and_then(|doc| doc.get("turns").and_then(Value::as_array).map(Vec::len)))
    }

    #[tokio::test]
    async fn turns_are_stored_in_order() -> Result<()> {
        let store = InMemoryDocumentStore::new();
        let ctx = RequestContext::new_request();
        let recorder =
            SessionRecorder::start(&ctx, deps(Arc::new(store.clone()))?, start_input(10)?).await?;

        let first = recorder.record_turn(&ctx, Speaker::User, "We need more budget.");
        let second = recorder.record_turn(&ctx, Speaker::Stakeholder, "Why now?");
        assert_eq!(first.await?, 1);
        assert_eq!(second.await?, 2);

        assert_eq!(stored_turns(&store, &ctx, &recorder.session_id()).await?, Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn closed_conversation_rejects_turns() -> Result<()> {
        let store = InMemoryDocumentStore::new();
        let ctx = RequestContext::new_request();
        let recorder =
            SessionRecorder::start(&ctx, deps(Arc::new(store.clone()))?, start_input(1)?).await?;

        recorder.record_turn(&ctx, Speaker::User, "Hello").await?;
        let rejected = recorder.record_turn(&ctx, Speaker::User, "Still there?").await;
        assert_eq!(
            rejected.err().map(|error| error.code),
            Some(ErrorCode::new("domain", "conversation_closed"))
        );
        assert_eq!(recorder.status(), ConversationStatus::Completed);
        assert_eq!(recorder.snapshot().turns.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn exit_is_persisted() -> Result<()> {
        let store = InMemoryDocumentStore::new();
        let ctx = RequestContext::new_request();
        let recorder =
            SessionRecorder::start(&ctx, deps(Arc::new(store.clone()))?, start_input(5)?).await?;

        recorder.exit(&ctx).await?;
        assert_eq!(recorder.status(), ConversationStatus::Exited);
        let stored = store
            .get(&ctx, DocumentKey::new(SESSIONS_COLLECTION, recorder.session_id().as_str()))
            .await?;
        assert_eq!(
            stored.and_then(|doc| doc["state"].get("exited").cloned()),
            Some(Value::Bool(true))
        );
        Ok(())
    }

    /// Store whose first write is slow, to prove later writes wait for it.
    struct SlowFirstWrite {
        inner: InMemoryDocumentStore,
        writes: std::sync::atomic::AtomicUsize,
    }

    impl DocumentStorePort for SlowFirstWrite {
        fn get(&self, ctx: &RequestContext, key: DocumentKey) -> BoxFuture<'_, Result<Option<Value>>> {
            self.inner.get(ctx, key)
        }

        fn set(
            &self,
            ctx: &RequestContext,
            key: DocumentKey,
            data: Value,
            mode: WriteMode,
        ) -> BoxFuture<'_, Result<()>> {
            let index = self
                .writes
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let ctx = ctx.clone();
            Box::pin(async move {
                if index == 1 {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                self.inner.set(&ctx, key, data, mode).await
            })
        }

        fn query(
            &self,
            ctx: &RequestContext,
            query: rehearse_ports::DocumentQuery,
        ) -> BoxFuture<'_, Result<Vec<rehearse_ports::StoredDocument>>> {
            self.inner.query(ctx, query)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_write_does_not_let_older_snapshot_win() -> Result<()> {
        let store = InMemoryDocumentStore::new();
        let slow = Arc::new(SlowFirstWrite {
            inner: store.clone(),
            writes: std::sync::atomic::AtomicUsize::new(0),
        });
        let ctx = RequestContext::new_request();
        let recorder = SessionRecorder::start(&ctx, deps(slow)?, start_input(10)?).await?;

        let first = recorder.record_turn(&ctx, Speaker::User, "one");
        let second = recorder.record_turn(&ctx, Speaker::Stakeholder, "two");
        let third = recorder.record_turn(&ctx, Speaker::User, "three");
        let (first, second, third) = tokio::join!(first, second, third);
        assert_eq!((first?, second?, third?), (1, 2, 3));

        recorder.flush().await?;
        assert_eq!(stored_turns(&store, &ctx, &recorder.session_id()).await?, Some(3));
        Ok(())
    }
}
