//! # rehearse-adapters
//!
//! Adapter implementations for ports: the hosted callable functions (HTTP and
//! an offline mock), document and key-value storage, logging and telemetry.
//! This crate depends on `ports`, `shared`, `domain` and `config`.

#[cfg(feature = "http")]
pub mod callable;
pub mod document_store;
pub mod kv_store;
pub mod log_sink;
pub mod logger;
pub mod mock_responder;
pub mod telemetry;
pub mod tracing_logger;

#[cfg(feature = "http")]
pub use callable::{HttpCallableClient, HttpCallableConfig};
pub use document_store::InMemoryDocumentStore;
pub use kv_store::{FileKeyValueStore, InMemoryKeyValueStore};
pub use log_sink::{LogSink, MemoryLogSink, StderrLogSink};
pub use logger::JsonLogger;
pub use mock_responder::{MOCK_OVERALL_SCORE, MockResponder};
pub use telemetry::{JsonTelemetry, TaggedTelemetry, TracingTelemetry};
pub use tracing_logger::TracingLogger;

/// Returns the adapters crate version.
#[must_use]
pub const fn adapters_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
