//! Resilient invocation of hosted functions.
//!
//! Each attempt is bounded by the configured timeout; retryable failures are
//! retried with exponential backoff. When the live call still fails, the
//! fallback responder (if configured) supplies a degraded result.

use crate::CallOutcome;
use crate::events::fields;
use rehearse_domain::FunctionName;
use rehearse_ports::{LoggerPort, RemoteCallPort, TelemetryPort, telemetry_tags};
use rehearse_shared::{
    ErrorClass, ErrorCode, ErrorDescriptor, ErrorEnvelope, RequestContext, Result, RetryPolicy,
    classify, retry_async_with_observer, timeout_with_context,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Dependencies shared by the remote-backed use cases.
#[derive(Clone)]
pub struct RemoteCallDeps {
    /// Primary remote adapter.
    pub remote: Arc<dyn RemoteCallPort>,
    /// Offline responder used when the primary call fails.
    pub fallback: Option<Arc<dyn RemoteCallPort>>,
    /// Retry policy for retryable failures.
    pub retry_policy: RetryPolicy,
    /// Per-attempt deadline.
    pub timeout: Duration,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    /// Optional telemetry sink.
    pub telemetry: Option<Arc<dyn TelemetryPort>>,
}

impl RemoteCallDeps {
    /// Deps with default retry and timeout, no fallback and no observability.
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteCallPort>) -> Self {
        Self {
            remote,
            fallback: None,
            retry_policy: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
            logger: None,
            telemetry: None,
        }
    }
}

const fn operation_name(function: FunctionName) -> &'static str {
    match function {
        FunctionName::SimulateStakeholder => "remote.simulateStakeholder",
        FunctionName::EvaluateSession => "remote.evaluateSession",
        FunctionName::GetCoachingHint => "remote.getCoachingHint",
    }
}

/// Invoke `function` with timeout and retry. Errors are returned unchanged.
#[tracing::instrument(name = "app.invoke_remote", skip_all, fields(function = function.as_str()))]
pub async fn invoke_remote(
    ctx: &RequestContext,
    deps: &RemoteCallDeps,
    function: FunctionName,
    payload: Value,
) -> Result<Value> {
    let operation = operation_name(function);
    let mut attempt = || {
        let remote = Arc::clone(&deps.remote);
        let payload = payload.clone();
        let timeout = deps.timeout;
        async move {
            timeout_with_context(ctx, timeout, operation, remote.invoke(ctx, function, payload))
                .await
        }
    };

    retry_async_with_observer(
        ctx,
        deps.retry_policy,
        operation,
        &mut attempt,
        |attempt, delay, error| {
            let descriptor = classify(error);
            if let Some(logger) = deps.logger.as_ref() {
                logger.warn(
                    "app.retry.scheduled",
                    "Retrying remote call after a retryable failure",
                    Some(fields([
                        ("function", Value::from(function.as_str())),
                        ("attempt", Value::from(attempt)),
                        (
                            "delayMs",
                            Value::from(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)),
                        ),
                        ("errorCode", Value::from(&*descriptor.code)),
                        (
                            "correlationId",
                            Value::from(ctx.correlation_id().as_str()),
                        ),
                    ])),
                );
            }
            if let Some(telemetry) = deps.telemetry.as_ref() {
                telemetry.increment_counter(
                    "app.retry.scheduled",
                    1,
                    Some(&telemetry_tags([("function", function.as_str())])),
                );
            }
        },
    )
    .await
}

/// Invoke `function` and fall back to the offline responder on failure.
///
/// Cancellation and supersession always propagate. A primary adapter that
/// reports itself as degraded yields degraded outcomes directly.
pub async fn invoke_with_fallback(
    ctx: &RequestContext,
    deps: &RemoteCallDeps,
    function: FunctionName,
    payload: Value,
) -> Result<CallOutcome<Value>> {
    if deps.remote.provider().degraded {
        let value = deps.remote.invoke(ctx, function, payload).await?;
        return Ok(CallOutcome::Degraded {
            value,
            reason: offline_reason(),
        });
    }

    match invoke_remote(ctx, deps, function, payload.clone()).await {
        Ok(value) => Ok(CallOutcome::Live(value)),
        Err(error) if error.is_cancelled() || error.is_superseded() => Err(error),
        Err(error) => match deps.fallback.as_ref() {
            Some(fallback) => {
                let value = fallback.invoke(ctx, function, payload).await?;
                Ok(CallOutcome::Degraded {
                    value,
                    reason: classify(&error),
                })
            },
            None => Err(error),
        },
    }
}

/// Reason reported when no live backend is configured.
#[must_use]
pub fn offline_reason() -> ErrorDescriptor {
    classify(&ErrorEnvelope::remote(
        "unavailable",
        "remote backend is not configured",
        ErrorClass::Retriable,
    ))
}

/// Decode a function result into a typed response.
pub fn decode_response<T: DeserializeOwned>(function: FunctionName, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("app", "invalid_response"),
            format!("unexpected {} response: {error}", function.as_str()),
        )
        .with_metadata("function", function.as_str())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedRemote;
    use rehearse_adapters::MockResponder;
    use serde_json::json;

    fn deps(remote: Arc<dyn RemoteCallPort>) -> RemoteCallDeps {
        RemoteCallDeps {
            retry_policy: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 1000,
            },
            ..RemoteCallDeps::new(remote)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_retryable_failures_until_success() -> Result<()> {
        let remote = Arc::new(ScriptedRemote::new(vec![
            Err(ScriptedRemote::unavailable()),
            Err(ScriptedRemote::unavailable()),
            Ok(json!({ "reply": "ok" })),
        ]));
        let value = invoke_remote(
            &RequestContext::new_request(),
            &deps(remote.clone()),
            FunctionName::SimulateStakeholder,
            json!({}),
        )
        .await?;

        assert_eq!(value, json!({ "reply": "ok" }));
        assert_eq!(remote.calls(), 3);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_failure_is_returned_after_one_attempt() {
        let remote = Arc::new(ScriptedRemote::new(vec![Err(ErrorEnvelope::remote(
            "permission-denied",
            "nope",
            ErrorClass::NonRetriable,
        ))]));
        let result = invoke_remote(
            &RequestContext::new_request(),
            &deps(remote.clone()),
            FunctionName::EvaluateSession,
            json!({}),
        )
        .await;

        assert_eq!(
            result.err().map(|error| error.code),
            Some(ErrorCode::remote("permission-denied"))
        );
        assert_eq!(remote.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_fall_back_to_degraded() -> Result<()> {
        let remote = Arc::new(ScriptedRemote::new(vec![
            Err(ScriptedRemote::unavailable()),
            Err(ScriptedRemote::unavailable()),
            Err(ScriptedRemote::unavailable()),
        ]));
        let mut deps = deps(remote.clone());
        deps.fallback = Some(Arc::new(MockResponder::new()));

        let outcome = invoke_with_fallback(
            &RequestContext::new_request(),
            &deps,
            FunctionName::GetCoachingHint,
            json!({ "lastMessage": "hi" }),
        )
        .await?;

        assert_eq!(remote.calls(), 3);
        assert!(outcome.is_degraded());
        assert_eq!(
            outcome.degraded_reason().map(|reason| &*reason.code),
            Some("unavailable")
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_never_falls_back() {
        let remote = Arc::new(ScriptedRemote::new(vec![Err(ScriptedRemote::unavailable())]));
        let mut deps = deps(remote);
        deps.fallback = Some(Arc::new(MockResponder::new()));
        let ctx = RequestContext::new_request();
        ctx.cancel();

        let result =
            invoke_with_fallback(&ctx, &deps, FunctionName::SimulateStakeholder, json!({})).await;
        assert!(result.is_err_and(|error| error.is_cancelled()));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempts_time_out_and_retry() -> Result<()> {
        let remote = Arc::new(
            ScriptedRemote::new(vec![Ok(json!("late")), Ok(json!("fast"))])
                .with_first_delay(Duration::from_secs(60)),
        );
        let mut deps = deps(remote.clone());
        deps.timeout = Duration::from_secs(5);

        let value = invoke_remote(
            &RequestContext::new_request(),
            &deps,
            FunctionName::SimulateStakeholder,
            json!({}),
        )
        .await?;
        assert_eq!(value, json!("fast"));
        assert_eq!(remote.calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn degraded_primary_reports_offline_reason() -> Result<()> {
        let deps = RemoteCallDeps::new(Arc::new(MockResponder::new()));
        let outcome = invoke_with_fallback(
            &RequestContext::new_request(),
            &deps,
            FunctionName::GetCoachingHint,
            json!({}),
        )
        .await?;
        assert_eq!(outcome.degraded_reason(), Some(&offline_reason()));
        Ok(())
    }

    #[test]
    fn decode_failure_names_the_function() {
        let result: Result<u32> = decode_response(FunctionName::EvaluateSession, json!("x"));
        let error = result.err();
        assert_eq!(
            error.as_ref().map(|error| error.code.clone()),
            Some(ErrorCode::new("app", "invalid_response"))
        );
        assert_eq!(
            error
                .as_ref()
                .and_then(|error| error.metadata.get("function"))
                .map(String::as_str),
            Some("evaluateSession")
        );
    }
}
