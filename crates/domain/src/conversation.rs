//! Conversation state machine.
//!
//! A practice conversation is a counter plus two terminal flags. It stays
//! open until the user exits, the session times out, or the turn limit is
//! reached. Closed conversations reject further turns.

use crate::PrimitiveError;
use rehearse_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default turn limit for a practice conversation.
pub const DEFAULT_MAX_TURNS: u32 = 20;

/// Who spoke a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The trainee.
    User,
    /// The simulated stakeholder.
    Stakeholder,
}

/// Derived conversation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    /// Turns may still be recorded.
    Active,
    /// The user ended the conversation.
    Exited,
    /// The session clock ran out.
    TimedOut,
    /// The turn limit was reached.
    Completed,
}

impl ConversationStatus {
    /// Returns true for every status except `Active`.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        !matches!(self, Self::Active)
    }

    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Exited => "exited",
            Self::TimedOut => "timed_out",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Rejected state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationClosed {
    /// Status at the time of the rejected transition.
    pub status: ConversationStatus,
}

impl fmt::Display for ConversationClosed {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "conversation is closed ({})", self.status)
    }
}

impl std::error::Error for ConversationClosed {}

impl From<ConversationClosed> for ErrorEnvelope {
    fn from(error: ConversationClosed) -> Self {
        Self::expected(
            ErrorCode::new("domain", "conversation_closed"),
            error.to_string(),
        )
        .with_metadata("status", error.status.as_str())
    }
}

/// Turn counter with exit and timeout flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    turn_count: u32,
    max_turns: u32,
    timed_out: bool,
    exited: bool,
}

impl ConversationState {
    /// Start a conversation allowing up to `max_turns` turns.
    pub const fn new(max_turns: u32) -> Result<Self, PrimitiveError> {
        if max_turns == 0 {
            return Err(PrimitiveError::InvalidMaxTurns { value: max_turns });
        }
        Ok(Self {
            turn_count: 0,
            max_turns,
            timed_out: false,
            exited: false,
        })
    }

    /// Turns recorded so far.
    #[must_use]
    pub const fn turn_count(&self) -> u32 {
        self.turn_count
    }

    /// Configured turn limit.
    #[must_use]
    pub const fn max_turns(&self) -> u32 {
        self.max_turns
    }

    /// Turns still available.
    #[must_use]
    pub const fn remaining_turns(&self) -> u32 {
        self.max_turns.saturating_sub(self.turn_count)
    }

    /// Current status. Exit takes precedence over timeout, timeout over completion.
    #[must_use]
    pub const fn status(&self) -> ConversationStatus {
        if self.exited {
            ConversationStatus::Exited
        } else if self.timed_out {
            ConversationStatus::TimedOut
        } else if self.turn_count >= self.max_turns {
            ConversationStatus::Completed
        } else {
            ConversationStatus::Active
        }
    }

    /// Record one turn and return the new count.
    pub fn record_turn(&mut self) -> Result<u32, ConversationClosed> {
        let status = self.status();
        if status.is_closed() {
            return Err(ConversationClosed { status });
        }
        self.turn_count = self.turn_count.saturating_add(1);
        Ok(self.turn_count)
    }

    /// Mark the session as timed out. Idempotent.
    pub const fn mark_timed_out(&mut self) {
        self.timed_out = true;
    }

    /// Mark the conversation as exited by the user. Idempotent.
    pub const fn exit(&mut self) {
        self.exited = true;
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            turn_count: 0,
            max_turns: DEFAULT_MAX_TURNS,
            timed_out: false,
            exited: false,
        }
    }
}
