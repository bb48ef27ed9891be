//! # rehearse-app
//!
//! Application use cases for the communication trainer: stakeholder replies,
//! session evaluation, debounced coaching hints and ordered session
//! persistence, each wrapped in the shared safety primitives.
//! This crate depends on `ports`, `domain`, and `shared`.

pub mod coaching_hint;
mod events;
pub mod evaluate_session;
pub mod outcome;
pub mod remote_call;
pub mod session_recorder;
pub mod simulate_stakeholder;

#[cfg(test)]
mod test_support;

pub use coaching_hint::{CoachingHint, CoachingHintInput, HintService, get_coaching_hint};
pub use evaluate_session::{EvaluateSessionDeps, EvaluateSessionInput, evaluate_session};
pub use outcome::CallOutcome;
pub use remote_call::{
    RemoteCallDeps, decode_response, invoke_remote, invoke_with_fallback, offline_reason,
};
pub use session_recorder::{SessionRecorder, SessionRecorderDeps, StartSessionInput};
pub use simulate_stakeholder::{
    SimulateStakeholderDeps, SimulateStakeholderInput, StakeholderReply, simulate_stakeholder,
};

/// Returns the app crate version.
#[must_use]
pub const fn app_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
