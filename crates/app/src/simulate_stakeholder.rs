//! Produce the simulated stakeholder's next reply.
//!
//! Replies pass through a [`LatestOnlyGate`]: when the user sends messages
//! faster than the backend answers, only the newest reply is surfaced and
//! older ones resolve to [`CallOutcome::Stale`].

use crate::events::{UseCaseEvents, fields};
use crate::remote_call::{RemoteCallDeps, decode_response, invoke_with_fallback};
use crate::CallOutcome;
use rehearse_domain::{FunctionName, ScenarioId, SessionId, TurnRecord};
use rehearse_shared::{ErrorCode, ErrorEnvelope, LatestOnlyGate, RequestContext, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Input payload for a stakeholder reply.
#[derive(Debug, Clone)]
pub struct SimulateStakeholderInput {
    /// Session being played.
    pub session_id: SessionId,
    /// Scenario driving the stakeholder persona.
    pub scenario_id: ScenarioId,
    /// The user's latest message.
    pub message: Box<str>,
    /// Earlier turns, oldest first.
    pub history: Vec<TurnRecord>,
}

/// Stakeholder reply returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeholderReply {
    /// Reply text.
    pub reply: Box<str>,
    /// Whether the stakeholder ended the conversation.
    #[serde(default)]
    pub session_ended: bool,
}

/// Dependencies required by simulate-stakeholder.
#[derive(Clone)]
pub struct SimulateStakeholderDeps {
    /// Remote call stack.
    pub remote: RemoteCallDeps,
    /// Gate shared by every reply request of one conversation.
    pub gate: LatestOnlyGate,
}

/// Request the stakeholder's reply to `input.message`.
#[tracing::instrument(
    name = "app.simulate_stakeholder",
    skip_all,
    fields(correlation_id = %ctx.correlation_id().as_str(), session_id = %input.session_id.as_str())
)]
pub async fn simulate_stakeholder(
    ctx: &RequestContext,
    deps: &SimulateStakeholderDeps,
    input: SimulateStakeholderInput,
) -> Result<CallOutcome<StakeholderReply>> {
    let events = UseCaseEvents::start(
        "simulateStakeholder",
        ctx,
        deps.remote.logger.as_deref(),
        deps.remote.telemetry.as_deref(),
        fields([
            ("sessionId", Value::from(input.session_id.as_str())),
            ("scenarioId", Value::from(input.scenario_id.as_str())),
            ("historyTurns", Value::from(input.history.len())),
        ]),
    );

    let result = run(ctx, deps, input).await;
    events.finish(&result);
    result
}

async fn run(
    ctx: &RequestContext,
    deps: &SimulateStakeholderDeps,
    input: SimulateStakeholderInput,
) -> Result<CallOutcome<StakeholderReply>> {
    ctx.ensure_not_cancelled("simulate_stakeholder.start")?;
    if input.message.trim().is_empty() {
        return Err(ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            "message must be non-empty",
        ));
    }

    let payload = json!({
        "sessionId": input.session_id.as_str(),
        "scenarioId": input.scenario_id.as_str(),
        "message": input.message,
        "history": input.history,
    });

    let outcome = deps
        .gate
        .try_execute(|| {
            invoke_with_fallback(ctx, &deps.remote, FunctionName::SimulateStakeholder, payload)
        })
        .await?;

    outcome
        .unwrap_or(CallOutcome::Stale)
        .try_map(|value| decode_response(FunctionName::SimulateStakeholder, value))
}
