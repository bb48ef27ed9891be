//! Score a finished session and persist the evaluation.

use crate::events::{UseCaseEvents, fields};
use crate::remote_call::{RemoteCallDeps, decode_response, invoke_with_fallback};
use crate::CallOutcome;
use rehearse_domain::{EVALUATIONS_COLLECTION, EvaluationRecord, FunctionName, SessionId, UserId};
use rehearse_ports::{DocumentKey, DocumentStorePort, WriteMode};
use rehearse_shared::{
    ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result, SequentialQueue,
};
use serde_json::{Value, json};
use std::sync::Arc;

/// Input payload for evaluating a session.
#[derive(Debug, Clone)]
pub struct EvaluateSessionInput {
    /// Session to evaluate.
    pub session_id: SessionId,
    /// Owner of the session.
    pub user_id: UserId,
}

/// Dependencies required by evaluate-session.
#[derive(Clone)]
pub struct EvaluateSessionDeps {
    /// Remote call stack.
    pub remote: RemoteCallDeps,
    /// Document store receiving the evaluation.
    pub documents: Arc<dyn DocumentStorePort>,
    /// Write queue shared with the session recorder.
    pub queue: SequentialQueue,
}

/// Evaluate `input.session_id`.
///
/// Live evaluations are stored in `evaluations/{sessionId}` after every
/// earlier queued write. Degraded placeholders are returned but not stored.
#[tracing::instrument(
    name = "app.evaluate_session",
    skip_all,
    fields(correlation_id = %ctx.correlation_id().as_str(), session_id = %input.session_id.as_str())
)]
pub async fn evaluate_session(
    ctx: &RequestContext,
    deps: &EvaluateSessionDeps,
    input: EvaluateSessionInput,
) -> Result<CallOutcome<EvaluationRecord>> {
    let events = UseCaseEvents::start(
        "evaluateSession",
        ctx,
        deps.remote.logger.as_deref(),
        deps.remote.telemetry.as_deref(),
        fields([("sessionId", Value::from(input.session_id.as_str()))]),
    );

    let result = run(ctx, deps, &input).await;
    events.finish(&result);
    result
}

async fn run(
    ctx: &RequestContext,
    deps: &EvaluateSessionDeps,
    input: &EvaluateSessionInput,
) -> Result<CallOutcome<EvaluationRecord>> {
    ctx.ensure_not_cancelled("evaluate_session.start")?;

    let payload = json!({
        "sessionId": input.session_id.as_str(),
        "userId": input.user_id.as_str(),
    });
    let outcome = invoke_with_fallback(ctx, &deps.remote, FunctionName::EvaluateSession, payload)
        .await?
        .try_map(|value| decode_evaluation(&input.session_id, value))?;

    if let CallOutcome::Live(record) = &outcome {
        persist_evaluation(ctx, deps, record).await?;
    }
    Ok(outcome)
}

fn decode_evaluation(session_id: &SessionId, value: Value) -> Result<EvaluationRecord> {
    let record: EvaluationRecord = decode_response(FunctionName::EvaluateSession, value)?;
    record.validate().map_err(ErrorEnvelope::from)?;
    if record.session_id != *session_id {
        return Err(ErrorEnvelope::expected(
            ErrorCode::new("app", "invalid_response"),
            "evaluation belongs to a different session",
        )
        .with_metadata("expected", session_id.as_str())
        .with_metadata("actual", record.session_id.as_str()));
    }
    Ok(record)
}

async fn persist_evaluation(
    ctx: &RequestContext,
    deps: &EvaluateSessionDeps,
    record: &EvaluationRecord,
) -> Result<()> {
    let data = serde_json::to_value(record).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            format!("failed to serialize evaluation: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    let key = DocumentKey::new(EVALUATIONS_COLLECTION, record.session_id.as_str());
    let documents = Arc::clone(&deps.documents);
    let ctx = ctx.clone();

    deps.queue
        .enqueue(move || async move { documents.set(&ctx, key, data, WriteMode::Replace).await })
        .await
}
