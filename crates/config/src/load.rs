//! Config loading helpers (env + file + overrides).
//!
//! The loader is responsible for deterministic merge order and surfacing
//! user-facing errors as typed `ErrorEnvelope`s.

use crate::{AppConfig, AppEnv, LogFormat, ValidatedAppConfig, apply_env_overrides};
use rehearse_shared::{ErrorClass, ErrorCode, ErrorEnvelope, SecretString};
use serde::Deserialize;
use std::path::Path;

/// Supported config file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.json` (also used when the file has no extension).
    Json,
    /// `.toml`.
    Toml,
}

impl ConfigFormat {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, ErrorEnvelope> {
        let ext = path
            .extension()
            .and_then(|value| value.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            None | Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            Some(other) => Err(ErrorEnvelope::expected(
                ErrorCode::new("config", "unsupported_format"),
                "unsupported config format; use .json or .toml",
            )
            .with_metadata("extension", other.to_string())),
        }
    }
}

/// Load the app config from sources using a deterministic precedence order.
///
/// Precedence (highest wins):
/// - env overrides (`AppEnv`)
/// - overrides JSON (partial config)
/// - config text (file content)
/// - defaults (`AppConfig::default()`)
pub fn load_app_config_from_sources(
    config_text: Option<(&str, ConfigFormat)>,
    overrides_json: Option<&str>,
    env: &AppEnv,
) -> Result<ValidatedAppConfig, ErrorEnvelope> {
    let mut config = match config_text {
        None => AppConfig::default(),
        Some((input, format)) => parse_config_unvalidated(input, format)?,
    };

    if let Some(input) = overrides_json {
        let overrides = parse_overrides_json(input)?;
        overrides.apply(&mut config);
    }

    // env is applied last and also validates/normalizes the resulting config.
    apply_env_overrides(config, env)
}

/// Load the app config from an optional file path.
pub fn load_app_config_from_path(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    env: &AppEnv,
) -> Result<ValidatedAppConfig, ErrorEnvelope> {
    match config_path {
        None => load_app_config_from_sources(None, overrides_json, env),
        Some(path) => {
            let format = ConfigFormat::from_path(path)?;
            let text = read_config_file(path)?;
            load_app_config_from_sources(Some((&text, format)), overrides_json, env)
        },
    }
}

/// Load the app config from std env and an optional file path.
pub fn load_app_config_std_env(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<ValidatedAppConfig, ErrorEnvelope> {
    let env = AppEnv::from_std_env().map_err(ErrorEnvelope::from)?;
    load_app_config_from_path(config_path, overrides_json, &env)
}

/// Serialize the config as deterministic pretty JSON (with trailing newline).
///
/// Secrets serialize as a redacted placeholder.
pub fn to_pretty_json(config: &AppConfig) -> Result<String, ErrorEnvelope> {
    let mut output = serde_json::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            format!("failed to serialize config: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

/// Serialize the config as deterministic pretty TOML (with trailing newline).
pub fn to_pretty_toml(config: &AppConfig) -> Result<String, ErrorEnvelope> {
    let mut output = toml::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::new("config", "serialize_toml"),
            format!("failed to serialize config TOML: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

fn parse_config_unvalidated(input: &str, format: ConfigFormat) -> Result<AppConfig, ErrorEnvelope> {
    match format {
        ConfigFormat::Json => serde_json::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_json"),
                format!("invalid config JSON: {error}"),
            )
            .with_metadata("source", "config")
        }),
        ConfigFormat::Toml => toml::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_toml"),
                format!("invalid config TOML: {error}"),
            )
            .with_metadata("source", "config")
        }),
    }
}

fn parse_overrides_json(input: &str) -> Result<AppConfigOverrides, ErrorEnvelope> {
    serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid overrides JSON: {error}"),
        )
        .with_metadata("source", "overrides")
    })
}

fn read_config_file(path: &Path) -> Result<String, ErrorEnvelope> {
    std::fs::read_to_string(path).map_err(|error| {
        let code = match error.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::new("config", "config_file_not_found"),
            std::io::ErrorKind::PermissionDenied => {
                ErrorCode::new("config", "config_file_permission_denied")
            },
            _ => ErrorCode::new("config", "config_file_io"),
        };

        ErrorEnvelope::expected(code, format!("failed to read config file: {error}"))
            .with_metadata("path", path.to_string_lossy().to_string())
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct AppConfigOverrides {
    version: Option<u32>,
    remote: RemoteOverrides,
    retry: RetryOverrides,
    debounce: DebounceOverrides,
    fallback: FallbackOverrides,
    storage: StorageOverrides,
    logging: LoggingOverrides,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct RemoteOverrides {
    base_url: Option<Box<str>>,
    timeout_ms: Option<u64>,
    auth_token: Option<SecretString>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct RetryOverrides {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct DebounceOverrides {
    hint_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct FallbackOverrides {
    enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct StorageOverrides {
    kv_path: Option<Box<str>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct LoggingOverrides {
    level: Option<Box<str>>,
    format: Option<LogFormat>,
}

impl AppConfigOverrides {
    fn apply(self, config: &mut AppConfig) {
        set(&mut config.version, self.version);

        set_opt(&mut config.remote.base_url, self.remote.base_url);
        set(&mut config.remote.timeout_ms, self.remote.timeout_ms);
        set_opt(&mut config.remote.auth_token, self.remote.auth_token);

        set(&mut config.retry.max_attempts, self.retry.max_attempts);
        set(&mut config.retry.base_delay_ms, self.retry.base_delay_ms);

        set(
            &mut config.debounce.hint_delay_ms,
            self.debounce.hint_delay_ms,
        );
        set(&mut config.fallback.enabled, self.fallback.enabled);
        set_opt(&mut config.storage.kv_path, self.storage.kv_path);

        set(&mut config.logging.level, self.logging.level);
        set(&mut config.logging.format, self.logging.format);
    }
}

fn set<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

fn set_opt<T>(field: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *field = value;
    }
}
