//! # rehearse-shared
//!
//! Shared error handling, request context and async safety primitives for
//! the rehearse workspace.
//!
//! - Result and error envelope types, secret redaction
//! - Total error classification ([`classify`])
//! - Exponential-backoff retry ([`retry_with_backoff`], [`retry_async`])
//! - Cooperative cancellation ([`CancelToken`], [`RequestContext`])
//! - Overlapping-call strategies: [`Debouncer`], [`LatestOnlyGate`],
//!   [`SequentialQueue`]
//!
//! This crate only depends on external crates.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod cancel;
pub mod classify;
pub mod context;
pub mod debounce;
pub mod errors;
pub mod latest_only;
pub mod redaction;
pub mod result;
pub mod retry;
pub mod sequential_queue;
pub mod timeout;

pub use cancel::{CancelToken, DEFAULT_CANCEL_MESSAGE};
pub use classify::{
    Classify, ErrorDescriptor, GENERIC_USER_MESSAGE, ServiceErrorCode, UNKNOWN_ERROR_CODE, classify,
};
pub use context::{CorrelationId, RequestContext};
pub use debounce::Debouncer;
pub use errors::{
    ErrorClass, ErrorCode, ErrorEnvelope, ErrorKind, ErrorMetadata, REDACTED_VALUE,
    UnexpectedError, normalize_unexpected_error, redact_metadata,
};
pub use latest_only::LatestOnlyGate;
pub use redaction::{REDACTED, SecretString, is_secret_key, redact_if_secret, redact_json};
pub use result::{Result, ResultExt};
pub use retry::{
    DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, RetryPolicy, retry_async,
    retry_async_with_observer, retry_with_backoff,
};
pub use sequential_queue::SequentialQueue;
pub use timeout::timeout_with_context;

/// Returns the shared crate version.
#[must_use]
pub const fn shared_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
