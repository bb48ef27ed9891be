//! Offline placeholder for the hosted functions.
//!
//! Answers are deterministic and deliberately generic. The provider reports
//! itself as degraded so callers can tell its output apart from live results.

use rehearse_domain::FunctionName;
use rehearse_ports::{BoxFuture, RemoteCallPort, RemoteProviderInfo};
use rehearse_shared::{RequestContext, Result};
use serde_json::{Value, json};

const STAKEHOLDER_REPLIES: [&str; 4] = [
    "I hear you. What would this change mean for my team's deadlines?",
    "That's not quite what I expected. Can you walk me through your reasoning?",
    "Okay. What do you need from me to move this forward?",
    "I'm not convinced yet. What happens if we leave things as they are?",
];

const COACHING_HINTS: [&str; 3] = [
    "Acknowledge their concern before restating your request.",
    "Ask an open question to surface what matters most to them.",
    "Summarize what you heard, then propose one concrete next step.",
];

/// Placeholder score used for offline evaluations.
pub const MOCK_OVERALL_SCORE: u32 = 70;

/// Deterministic stand-in for the remote functions.
#[derive(Debug, Clone)]
pub struct MockResponder {
    provider: RemoteProviderInfo,
}

impl Default for MockResponder {
    fn default() -> Self {
        Self {
            provider: RemoteProviderInfo::degraded("mock"),
        }
    }
}

impl MockResponder {
    /// Create a mock responder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the placeholder response for `function`.
    #[must_use]
    pub fn respond(function: FunctionName, payload: &Value) -> Value {
        match function {
            FunctionName::SimulateStakeholder => {
                let message = text_field(payload, "message");
                json!({
                    "reply": pick(&STAKEHOLDER_REPLIES, message),
                    "sessionEnded": false,
                })
            },
            FunctionName::EvaluateSession => json!({
                "sessionId": text_field(payload, "sessionId"),
                "overallScore": MOCK_OVERALL_SCORE,
                "summary": "Evaluation unavailable offline; this is a placeholder summary.",
                "missedOpportunities": [],
                "drills": ["Practice opening with the outcome you want."],
            }),
            FunctionName::GetCoachingHint => {
                let context = text_field(payload, "lastMessage");
                json!({ "hint": pick(&COACHING_HINTS, context) })
            },
        }
    }
}

impl RemoteCallPort for MockResponder {
    fn provider(&self) -> &RemoteProviderInfo {
        &self.provider
    }

    fn invoke(
        &self,
        ctx: &RequestContext,
        function: FunctionName,
        payload: Value,
    ) -> BoxFuture<'_, Result<Value>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("mock_responder.invoke")?;
            Ok(Self::respond(function, &payload))
        })
    }
}

fn text_field<'a>(payload: &'a Value, field: &str) -> &'a str {
    payload.get(field).and_then(Value::as_str).unwrap_or("")
}

fn pick<'a>(options: &[&'a str], seed: &str) -> &'a str {
    let index = seed.chars().count() % options.len().max(1);
    options.get(index).copied().unwrap_or_default()
}
