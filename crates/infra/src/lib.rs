//! # rehearse-infra
//!
//! Infrastructure wiring and runtime composition.
//! This crate depends on `app`, `adapters`, `config`, and `shared`.

/// Adapter selection from validated config.
pub mod adapter_factory;
/// Config loading helpers used by CLI surfaces.
pub mod config_check;
/// Environment validation helpers used by CLI surfaces.
pub mod env_check;
/// Explicit monitoring context.
pub mod monitoring;
/// Composition root.
pub mod runtime;

pub use adapter_factory::{
    build_fallback_port, build_key_value_store, build_logger, build_remote_port, build_telemetry,
    parse_log_level,
};
pub use config_check::load_effective_config_json;
pub use env_check::{InfraError, InfraResult, validate_env_parsing};
pub use monitoring::Monitoring;
pub use runtime::AppRuntime;

// Re-export redaction utilities for CLI boundary sanitization
pub use rehearse_shared::{is_secret_key, redact_if_secret};

/// Returns the infra crate version.
#[must_use]
pub const fn infra_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
