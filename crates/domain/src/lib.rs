//! # rehearse-domain
//!
//! Domain primitives and records for the communication trainer.
//!
//! - **Primitives** - `SessionId`, `UserId`, `ScenarioId`, `FunctionName`
//! - **Conversation** - `ConversationState` turn counter with exit/timeout flags
//! - **Records** - session, evaluation and user documents
//!
//! ## Dependency Rules
//!
//! - Depends only on `shared` crate
//! - No infrastructure or adapter dependencies
//! - Pure domain logic with no I/O

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub use rehearse_shared::shared_crate_version;

pub mod conversation;
pub mod primitives;
pub mod records;

pub use conversation::{
    ConversationClosed, ConversationState, ConversationStatus, DEFAULT_MAX_TURNS, Speaker,
};
pub use primitives::{FunctionName, PrimitiveError, ScenarioId, SessionId, UserId};
pub use records::{
    EVALUATIONS_COLLECTION, EvaluationRecord, SESSIONS_COLLECTION, SessionRecord, TurnRecord,
    USERS_COLLECTION, UserRecord,
};

/// Returns the domain crate version.
#[must_use]
pub const fn domain_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
