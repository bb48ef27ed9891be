//! # rehearse-config
//!
//! Configuration schema, validation, env overrides and loading for the
//! rehearse CLI. This crate depends on `shared` only.

/// Environment variable parsing and merging.
pub mod env;
/// Config loading helpers (env + file + overrides).
pub mod load;
/// Configuration schema types and helpers.
pub mod schema;

pub use env::{
    AppEnv, ENV_DEBOUNCE_HINT_DELAY_MS, ENV_FALLBACK_ENABLED, ENV_LOG_FORMAT, ENV_LOG_LEVEL,
    ENV_REMOTE_AUTH_TOKEN, ENV_REMOTE_BASE_URL, ENV_REMOTE_TIMEOUT_MS, ENV_RETRY_BASE_DELAY_MS,
    ENV_RETRY_MAX_ATTEMPTS, ENV_STORAGE_KV_PATH, EnvParseError, apply_env_overrides,
};
pub use load::{
    ConfigFormat, load_app_config_from_path, load_app_config_from_sources,
    load_app_config_std_env, to_pretty_json, to_pretty_toml,
};
pub use schema::{
    AppConfig, CURRENT_CONFIG_VERSION, ConfigSchemaError, DebounceConfig, FallbackConfig,
    LOG_LEVELS, LogFormat, LoggingConfig, RemoteConfig, RetryConfig, StorageConfig,
    ValidatedAppConfig, parse_app_config_json, parse_app_config_toml,
};

/// Returns the config crate version.
#[must_use]
pub const fn config_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rehearse_shared::shared_crate_version;

    #[test]
    fn config_crate_compiles() {
        assert!(!config_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }
}
