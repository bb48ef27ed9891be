//! Environment validation helpers for CLI surfaces.

use rehearse_config::{AppConfig, AppEnv, apply_env_overrides};
use rehearse_shared::{ErrorEnvelope, ResultExt};
use std::collections::BTreeMap;

/// Infra-level error type (shared error envelope).
pub type InfraError = ErrorEnvelope;

/// Infra-level result type.
pub type InfraResult<T> = Result<T, InfraError>;

/// Parse scoped env vars and check they merge into a config.
///
/// Failures carry `source = env` so callers can tell them apart from file
/// or override errors.
pub fn validate_env_parsing(env: &BTreeMap<String, String>) -> InfraResult<AppEnv> {
    let parsed = AppEnv::from_map(env)
        .map_err(ErrorEnvelope::from)
        .with_error_metadata("source", "env")?;
    apply_env_overrides(AppConfig::default(), &parsed).with_error_metadata("source", "env")?;
    Ok(parsed)
}
