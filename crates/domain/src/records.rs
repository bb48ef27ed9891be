//! Records persisted in the document store.

use crate::{ConversationState, PrimitiveError, ScenarioId, SessionId, Speaker, UserId};
use serde::{Deserialize, Serialize};

/// Collection holding session documents.
pub const SESSIONS_COLLECTION: &str = "sessions";
/// Collection holding user profile documents.
pub const USERS_COLLECTION: &str = "users";
/// Collection holding evaluation documents.
pub const EVALUATIONS_COLLECTION: &str = "evaluations";

/// One utterance in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRecord {
    /// Who spoke.
    pub speaker: Speaker,
    /// Utterance text.
    pub text: Box<str>,
    /// Milliseconds since the Unix epoch.
    pub at_ms: u64,
}

/// A practice session document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Session identifier (document id).
    pub session_id: SessionId,
    /// Owner of the session.
    pub user_id: UserId,
    /// Scenario being practised.
    pub scenario_id: ScenarioId,
    /// Conversation counters and flags.
    pub state: ConversationState,
    /// Recorded turns, oldest first.
    #[serde(default)]
    pub turns: Vec<TurnRecord>,
    /// Milliseconds since the Unix epoch.
    pub started_at_ms: u64,
}

impl SessionRecord {
    /// Start an empty session.
    #[must_use]
    pub fn start(
        session_id: SessionId,
        user_id: UserId,
        scenario_id: ScenarioId,
        state: ConversationState,
        started_at_ms: u64,
    ) -> Self {
        Self {
            session_id,
            user_id,
            scenario_id,
            state,
            turns: Vec::new(),
            started_at_ms,
        }
    }
}

/// Evaluation returned by the backend for a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRecord {
    /// Evaluated session.
    pub session_id: SessionId,
    /// Overall score in `0..=100`.
    pub overall_score: u32,
    /// Short narrative summary.
    #[serde(default)]
    pub summary: Box<str>,
    /// Moments the trainee could have handled better.
    #[serde(default)]
    pub missed_opportunities: Vec<Box<str>>,
    /// Suggested practice drills.
    #[serde(default)]
    pub drills: Vec<Box<str>>,
}

impl EvaluationRecord {
    /// Check the score bound.
    pub const fn validate(&self) -> Result<(), PrimitiveError> {
        if self.overall_score > 100 {
            return Err(PrimitiveError::ScoreOutOfRange {
                value: self.overall_score,
            });
        }
        Ok(())
    }
}

/// User profile document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// User identifier (document id).
    pub user_id: UserId,
    /// Name shown in the UI.
    pub display_name: Box<str>,
    /// Completed sessions count.
    #[serde(default)]
    pub sessions_completed: u32,
}
