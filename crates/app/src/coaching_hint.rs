//! Coaching hints for the user's draft message.
//!
//! Hints are requested while the user types, so [`HintService`] debounces
//! requests: only the last draft within the delay window reaches the backend
//! and earlier requests fail with `core:superseded`.

use crate::events::{UseCaseEvents, fields};
use crate::remote_call::{RemoteCallDeps, decode_response, invoke_with_fallback};
use crate::CallOutcome;
use rehearse_domain::{FunctionName, ScenarioId, SessionId};
use rehearse_shared::{Debouncer, RequestContext, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Input payload for a coaching hint.
#[derive(Debug, Clone)]
pub struct CoachingHintInput {
    /// Session being played.
    pub session_id: SessionId,
    /// Scenario being practised.
    pub scenario_id: ScenarioId,
    /// The user's unsent draft.
    pub draft: Box<str>,
    /// The stakeholder's last message, if any.
    pub last_message: Option<Box<str>>,
}

/// Hint returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachingHint {
    /// Hint text.
    pub hint: Box<str>,
}

/// Request one coaching hint without debouncing.
#[tracing::instrument(
    name = "app.get_coaching_hint",
    skip_all,
    fields(correlation_id = %ctx.correlation_id().as_str(), session_id = %input.session_id.as_str())
)]
pub async fn get_coaching_hint(
    ctx: &RequestContext,
    deps: &RemoteCallDeps,
    input: CoachingHintInput,
) -> Result<CallOutcome<CoachingHint>> {
    let events = UseCaseEvents::start(
        "getCoachingHint",
        ctx,
        deps.logger.as_deref(),
        deps.telemetry.as_deref(),
        fields([
            ("sessionId", Value::from(input.session_id.as_str())),
            ("draftChars", Value::from(input.draft.chars().count())),
        ]),
    );

    let result = async {
        ctx.ensure_not_cancelled("get_coaching_hint.start")?;
        let payload = json!({
            "sessionId": input.session_id.as_str(),
            "scenarioId": input.scenario_id.as_str(),
            "draft": input.draft,
            "lastMessage": input.last_message,
        });
        invoke_with_fallback(ctx, deps, FunctionName::GetCoachingHint, payload)
            .await?
            .try_map(|value| decode_response(FunctionName::GetCoachingHint, value))
    }
    .await;

    events.finish(&result);
    result
}

type HintArgs = (RequestContext, CoachingHintInput);

/// Debounced front for [`get_coaching_hint`].
#[derive(Debug, Clone)]
pub struct HintService {
    debouncer: Debouncer<HintArgs, CallOutcome<CoachingHint>>,
}

impl HintService {
    /// Create a service on the current tokio runtime.
    pub fn new(deps: RemoteCallDeps, delay: Duration) -> Result<Self> {
        let deps = Arc::new(deps);
        let debouncer = Debouncer::new(
            move |(ctx, input): HintArgs| {
                let deps = Arc::clone(&deps);
                async move { get_coaching_hint(&ctx, &deps, input).await }
            },
            delay,
        )?;
        Ok(Self { debouncer })
    }

    /// Schedule a hint for `input`, superseding any request still waiting.
    pub fn request(
        &self,
        ctx: &RequestContext,
        input: CoachingHintInput,
    ) -> impl Future<Output = Result<CallOutcome<CoachingHint>>> + Send + 'static {
        self.debouncer.call((ctx.clone(), input))
    }

    /// Cancel the waiting request, if any.
    pub fn cancel(&self) {
        self.debouncer.cancel();
    }

    /// Returns true while a request is waiting for its timer.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.debouncer.has_pending()
    }
}
