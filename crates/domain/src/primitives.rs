//! Domain primitives with validated constructors.

use rehearse_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Validation failures for domain primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    /// `SessionId` is empty after trimming.
    InvalidSessionId {
        /// Length of the raw input before trimming.
        input_length: usize,
    },
    /// `UserId` is empty after trimming.
    InvalidUserId {
        /// Length of the raw input before trimming.
        input_length: usize,
    },
    /// `ScenarioId` is empty after trimming.
    InvalidScenarioId {
        /// Length of the raw input before trimming.
        input_length: usize,
    },
    /// Function name is not one of the hosted endpoints.
    UnknownFunctionName {
        /// Trimmed input that failed to match.
        input: String,
    },
    /// A conversation needs room for at least one turn.
    InvalidMaxTurns {
        /// Rejected value.
        value: u32,
    },
    /// Evaluation score outside `0..=100`.
    ScoreOutOfRange {
        /// Rejected value.
        value: u32,
    },
}

impl PrimitiveError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidSessionId { .. } => ErrorCode::new("domain", "invalid_session_id"),
            Self::InvalidUserId { .. } => ErrorCode::new("domain", "invalid_user_id"),
            Self::InvalidScenarioId { .. } => ErrorCode::new("domain", "invalid_scenario_id"),
            Self::UnknownFunctionName { .. } => ErrorCode::new("domain", "unknown_function"),
            Self::InvalidMaxTurns { .. } => ErrorCode::new("domain", "invalid_max_turns"),
            Self::ScoreOutOfRange { .. } => ErrorCode::new("domain", "score_out_of_range"),
        }
    }
}

impl fmt::Display for PrimitiveError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSessionId { .. } => formatter.write_str("SessionId must be non-empty"),
            Self::InvalidUserId { .. } => formatter.write_str("UserId must be non-empty"),
            Self::InvalidScenarioId { .. } => formatter.write_str("ScenarioId must be non-empty"),
            Self::UnknownFunctionName { input } => write!(
                formatter,
                "unknown function `{input}` (expected simulateStakeholder, evaluateSession or getCoachingHint)"
            ),
            Self::InvalidMaxTurns { .. } => formatter.write_str("maxTurns must be >= 1"),
            Self::ScoreOutOfRange { .. } => formatter.write_str("score must be within 0..=100"),
        }
    }
}

impl std::error::Error for PrimitiveError {}

impl From<PrimitiveError> for ErrorEnvelope {
    fn from(error: PrimitiveError) -> Self {
        let envelope = Self::expected(error.error_code(), error.to_string());

        match error {
            PrimitiveError::InvalidSessionId { input_length }
            | PrimitiveError::InvalidUserId { input_length }
            | PrimitiveError::InvalidScenarioId { input_length } => {
                envelope.with_metadata("input_length", input_length.to_string())
            },
            PrimitiveError::UnknownFunctionName { input } => envelope.with_metadata("input", input),
            PrimitiveError::InvalidMaxTurns { value } | PrimitiveError::ScoreOutOfRange { value } => {
                envelope.with_metadata("value", value.to_string())
            },
        }
    }
}

macro_rules! validated_id {
    ($(#[$meta:meta])* $name:ident, $variant:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Box<str>);

        impl $name {
            /// Parse from user input; surrounding whitespace is trimmed.
            pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
                let raw = input.as_ref();
                let Some(trimmed) = trimmed_non_empty(raw) else {
                    return Err(PrimitiveError::$variant {
                        input_length: raw.len(),
                    });
                };
                Ok(Self(trimmed.to_owned().into_boxed_str()))
            }

            /// Access the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str(self.as_str())
            }
        }
    };
}

validated_id!(
    /// Identifier of a practice session.
    SessionId,
    InvalidSessionId
);

validated_id!(
    /// Identifier of a signed-in user.
    UserId,
    InvalidUserId
);

validated_id!(
    /// Identifier of a role-play scenario.
    ScenarioId,
    InvalidScenarioId
);

impl SessionId {
    /// Generate a fresh random session id.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("session_{}", uuid::Uuid::new_v4().simple()).into_boxed_str())
    }
}

/// Hosted callable functions exposed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FunctionName {
    /// Produce the stakeholder's next reply.
    SimulateStakeholder,
    /// Score a finished session.
    EvaluateSession,
    /// Suggest a hint for the user's draft message.
    GetCoachingHint,
}

impl FunctionName {
    /// All hosted functions.
    pub const ALL: [Self; 3] = [
        Self::SimulateStakeholder,
        Self::EvaluateSession,
        Self::GetCoachingHint,
    ];

    /// Wire name of the function.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SimulateStakeholder => "simulateStakeholder",
            Self::EvaluateSession => "evaluateSession",
            Self::GetCoachingHint => "getCoachingHint",
        }
    }

    /// Parse a wire name; kebab-case and snake-case spellings are accepted.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let trimmed = input.as_ref().trim();
        let folded: String = trimmed
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        Self::ALL
            .into_iter()
            .find(|name| name.as_str().to_ascii_lowercase() == folded)
            .ok_or_else(|| PrimitiveError::UnknownFunctionName {
                input: trimmed.to_owned(),
            })
    }
}

impl FromStr for FunctionName {
    type Err = PrimitiveError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

fn trimmed_non_empty(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
