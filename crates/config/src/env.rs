//! Environment variable parsing and env-to-config merging.
//!
//! Env parsing is strict: a variable that is present but blank or malformed
//! fails fast instead of silently falling back. Secret values never appear in
//! error metadata.

use crate::schema::{AppConfig, LOG_LEVELS, LogFormat, ValidatedAppConfig};
use rehearse_shared::{ErrorCode, ErrorEnvelope, REDACTED_VALUE, SecretString, is_secret_key};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Env var: functions endpoint base URL.
pub const ENV_REMOTE_BASE_URL: &str = "REHEARSE_REMOTE_BASE_URL";
/// Env var: per-call timeout in milliseconds.
pub const ENV_REMOTE_TIMEOUT_MS: &str = "REHEARSE_REMOTE_TIMEOUT_MS";
/// Env var: bearer token for the functions endpoint (secret).
pub const ENV_REMOTE_AUTH_TOKEN: &str = "REHEARSE_REMOTE_AUTH_TOKEN";
/// Env var: retry max attempts.
pub const ENV_RETRY_MAX_ATTEMPTS: &str = "REHEARSE_RETRY_MAX_ATTEMPTS";
/// Env var: retry base delay in ms.
pub const ENV_RETRY_BASE_DELAY_MS: &str = "REHEARSE_RETRY_BASE_DELAY_MS";
/// Env var: coaching hint debounce delay in ms.
pub const ENV_DEBOUNCE_HINT_DELAY_MS: &str = "REHEARSE_DEBOUNCE_HINT_DELAY_MS";
/// Env var: enable degraded fallback.
pub const ENV_FALLBACK_ENABLED: &str = "REHEARSE_FALLBACK_ENABLED";
/// Env var: key-value store file path.
pub const ENV_STORAGE_KV_PATH: &str = "REHEARSE_STORAGE_KV_PATH";
/// Env var: log level.
pub const ENV_LOG_LEVEL: &str = "REHEARSE_LOG_LEVEL";
/// Env var: log format (`text` or `json`).
pub const ENV_LOG_FORMAT: &str = "REHEARSE_LOG_FORMAT";

const ALL_ENV_VARS: [&str; 10] = [
    ENV_REMOTE_BASE_URL,
    ENV_REMOTE_TIMEOUT_MS,
    ENV_REMOTE_AUTH_TOKEN,
    ENV_RETRY_MAX_ATTEMPTS,
    ENV_RETRY_BASE_DELAY_MS,
    ENV_DEBOUNCE_HINT_DELAY_MS,
    ENV_FALLBACK_ENABLED,
    ENV_STORAGE_KV_PATH,
    ENV_LOG_LEVEL,
    ENV_LOG_FORMAT,
];

/// Typed env-derived overrides for `AppConfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppEnv {
    /// Override for `remote.baseUrl`.
    pub remote_base_url: Option<Box<str>>,
    /// Override for `remote.timeoutMs`.
    pub remote_timeout_ms: Option<u64>,
    /// Override for `remote.authToken`.
    pub remote_auth_token: Option<SecretString>,
    /// Override for `retry.maxAttempts`.
    pub retry_max_attempts: Option<u32>,
    /// Override for `retry.baseDelayMs`.
    pub retry_base_delay_ms: Option<u64>,
    /// Override for `debounce.hintDelayMs`.
    pub debounce_hint_delay_ms: Option<u64>,
    /// Override for `fallback.enabled`.
    pub fallback_enabled: Option<bool>,
    /// Override for `storage.kvPath`.
    pub storage_kv_path: Option<Box<str>>,
    /// Override for `logging.level`.
    pub log_level: Option<Box<str>>,
    /// Override for `logging.format`.
    pub log_format: Option<LogFormat>,
}

impl AppEnv {
    /// Parse env overrides from a key/value map (useful for tests and fixtures).
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, EnvParseError> {
        Ok(Self {
            remote_base_url: parse_optional_url_string(map, ENV_REMOTE_BASE_URL)?,
            remote_timeout_ms: parse_optional_u64(map, ENV_REMOTE_TIMEOUT_MS)?,
            remote_auth_token: parse_optional_secret(map, ENV_REMOTE_AUTH_TOKEN)?,
            retry_max_attempts: parse_optional_u32(map, ENV_RETRY_MAX_ATTEMPTS)?,
            retry_base_delay_ms: parse_optional_u64(map, ENV_RETRY_BASE_DELAY_MS)?,
            debounce_hint_delay_ms: parse_optional_u64(map, ENV_DEBOUNCE_HINT_DELAY_MS)?,
            fallback_enabled: parse_optional_bool(map, ENV_FALLBACK_ENABLED)?,
            storage_kv_path: parse_optional_trimmed_string(map, ENV_STORAGE_KV_PATH)?,
            log_level: parse_optional_log_level(map, ENV_LOG_LEVEL)?,
            log_format: parse_optional_log_format(map, ENV_LOG_FORMAT)?,
        })
    }

    /// Parse env overrides from the process environment.
    pub fn from_std_env() -> Result<Self, EnvParseError> {
        let map: BTreeMap<String, String> = ALL_ENV_VARS
            .iter()
            .filter_map(|name| {
                std::env::var(name)
                    .ok()
                    .map(|value| ((*name).to_string(), value))
            })
            .collect();

        Self::from_map(&map)
    }

    /// True when no override is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Apply env overrides to a base config (env wins over file/default values).
pub fn apply_env_overrides(
    base: AppConfig,
    env: &AppEnv,
) -> Result<ValidatedAppConfig, ErrorEnvelope> {
    let mut config = base;

    if let Some(base_url) = env.remote_base_url.as_ref() {
        config.remote.base_url = Some(base_url.clone());
    }
    set_if_some(&mut config.remote.timeout_ms, env.remote_timeout_ms);
    if let Some(token) = env.remote_auth_token.as_ref() {
        config.remote.auth_token = Some(token.clone());
    }
    set_if_some(&mut config.retry.max_attempts, env.retry_max_attempts);
    set_if_some(&mut config.retry.base_delay_ms, env.retry_base_delay_ms);
    set_if_some(
        &mut config.debounce.hint_delay_ms,
        env.debounce_hint_delay_ms,
    );
    set_if_some(&mut config.fallback.enabled, env.fallback_enabled);
    if let Some(path) = env.storage_kv_path.as_ref() {
        config.storage.kv_path = Some(path.clone());
    }
    if let Some(level) = env.log_level.as_ref() {
        config.logging.level = level.clone();
    }
    set_if_some(&mut config.logging.format, env.log_format);

    config.validate_and_normalize().map_err(Into::into)
}

fn set_if_some<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

/// Validation failures when parsing env variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvParseError {
    /// An env var was present but empty after trimming.
    EmptyValue {
        /// Env var name.
        var: &'static str,
    },
    /// A secret env var was present but empty after trimming.
    EmptySecret {
        /// Env var name.
        var: &'static str,
    },
    /// Boolean env var had an invalid value.
    InvalidBool {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Integer env var had an invalid value.
    InvalidInt {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// URL env var had an invalid value.
    InvalidUrl {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Enum env var had an invalid value.
    InvalidEnum {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
}

impl EnvParseError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyValue { .. } | Self::EmptySecret { .. } => {
                ErrorCode::new("config", "empty_env_var")
            },
            Self::InvalidBool { .. } => ErrorCode::new("config", "invalid_env_bool"),
            Self::InvalidInt { .. } => ErrorCode::new("config", "invalid_env_int"),
            Self::InvalidUrl { .. } => ErrorCode::new("config", "invalid_env_url"),
            Self::InvalidEnum { .. } => ErrorCode::new("config", "invalid_env_enum"),
        }
    }
}

impl fmt::Display for EnvParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyValue { var } | Self::EmptySecret { var } => {
                write!(formatter, "{var} must be non-empty")
            },
            Self::InvalidBool { var, .. } => write!(formatter, "{var} must be a boolean"),
            Self::InvalidInt { var, .. } => write!(formatter, "{var} must be an integer"),
            Self::InvalidUrl { var, .. } => write!(formatter, "{var} must be a valid URL"),
            Self::InvalidEnum { var, .. } => write!(formatter, "{var} has an unsupported value"),
        }
    }
}

impl std::error::Error for EnvParseError {}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);

        match error {
            EnvParseError::EmptyValue { var } | EnvParseError::EmptySecret { var } => {
                envelope.with_metadata("env_var", var)
            },
            EnvParseError::InvalidBool { var, value }
            | EnvParseError::InvalidInt { var, value }
            | EnvParseError::InvalidUrl { var, value }
            | EnvParseError::InvalidEnum { var, value } => envelope
                .with_metadata("env_var", var)
                .with_metadata("value", redact_value(var, &value)),
        }
    }
}

fn non_empty<'a>(
    map: &'a BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<&'a str>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }
    Ok(Some(trimmed))
}

fn parse_optional_trimmed_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    Ok(non_empty(map, var)?.map(Box::from))
}

fn parse_optional_secret(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<SecretString>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptySecret { var });
    }

    Ok(Some(SecretString::new(trimmed)))
}

fn parse_optional_u64(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u64>, EnvParseError> {
    let Some(trimmed) = non_empty(map, var)? else {
        return Ok(None);
    };
    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: trimmed.to_string(),
        })
}

fn parse_optional_u32(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u32>, EnvParseError> {
    let Some(trimmed) = non_empty(map, var)? else {
        return Ok(None);
    };
    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: trimmed.to_string(),
        })
}

fn parse_optional_bool(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<bool>, EnvParseError> {
    let Some(trimmed) = non_empty(map, var)? else {
        return Ok(None);
    };
    match trimmed.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        _ => Err(EnvParseError::InvalidBool {
            var,
            value: trimmed.to_string(),
        }),
    }
}

fn parse_optional_log_level(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    let Some(trimmed) = non_empty(map, var)? else {
        return Ok(None);
    };
    let normalized = trimmed.to_ascii_lowercase();
    if LOG_LEVELS.contains(&normalized.as_str()) {
        Ok(Some(normalized.into_boxed_str()))
    } else {
        Err(EnvParseError::InvalidEnum {
            var,
            value: trimmed.to_string(),
        })
    }
}

fn parse_optional_log_format(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<LogFormat>, EnvParseError> {
    let Some(trimmed) = non_empty(map, var)? else {
        return Ok(None);
    };
    LogFormat::parse(trimmed)
        .map(Some)
        .ok_or_else(|| EnvParseError::InvalidEnum {
            var,
            value: trimmed.to_string(),
        })
}

fn parse_optional_url_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    let Some(trimmed) = non_empty(map, var)? else {
        return Ok(None);
    };

    let invalid = || EnvParseError::InvalidUrl {
        var,
        value: trimmed.to_string(),
    };
    let parsed = Url::parse(trimmed).map_err(|_| invalid())?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(invalid());
    }

    Ok(Some(trimmed.trim_end_matches('/').into()))
}

fn redact_value(var: &str, value: &str) -> String {
    if is_secret_key(var) {
        REDACTED_VALUE.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn env_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn missing_vars_parse_to_empty_overrides() -> Result<(), Box<dyn Error>> {
        let env = AppEnv::from_map(&BTreeMap::new())?;
        assert!(env.is_empty());
        Ok(())
    }

    #[test]
    fn values_are_trimmed_and_typed() -> Result<(), Box<dyn Error>> {
        let env = AppEnv::from_map(&env_map(&[
            (ENV_REMOTE_TIMEOUT_MS, " 5000 "),
            (ENV_FALLBACK_ENABLED, "off"),
            (ENV_LOG_LEVEL, "DEBUG"),
            (ENV_LOG_FORMAT, "Json"),
        ]))?;
        assert_eq!(env.remote_timeout_ms, Some(5_000));
        assert_eq!(env.fallback_enabled, Some(false));
        assert_eq!(env.log_level.as_deref(), Some("debug"));
        assert_eq!(env.log_format, Some(LogFormat::Json));
        Ok(())
    }

    #[test]
    fn url_validation_accepts_http_and_https() -> Result<(), Box<dyn Error>> {
        let env = AppEnv::from_map(&env_map(&[(
            ENV_REMOTE_BASE_URL,
            "https://example.com/functions/",
        )]))?;
        assert_eq!(
            env.remote_base_url.as_deref(),
            Some("https://example.com/functions")
        );

        let error = AppEnv::from_map(&env_map(&[(ENV_REMOTE_BASE_URL, "ftp://example.com")])).err();
        assert!(matches!(error, Some(EnvParseError::InvalidUrl { .. })));
        Ok(())
    }

    #[test]
    fn invalid_ints_fail_fast() {
        let error = AppEnv::from_map(&env_map(&[(ENV_RETRY_MAX_ATTEMPTS, "three")])).err();
        assert_eq!(
            error,
            Some(EnvParseError::InvalidInt {
                var: ENV_RETRY_MAX_ATTEMPTS,
                value: "three".to_string(),
            })
        );
    }

    #[test]
    fn secret_values_are_redacted_in_error_metadata() -> Result<(), Box<dyn Error>> {
        let error = AppEnv::from_map(&env_map(&[(ENV_REMOTE_AUTH_TOKEN, "   ")])).err();
        let envelope: ErrorEnvelope = error
            .ok_or_else(|| std::io::Error::other("expected secret error"))?
            .into();

        assert_eq!(envelope.code, ErrorCode::new("config", "empty_env_var"));
        assert_eq!(
            envelope.metadata.get("env_var").map(String::as_str),
            Some(ENV_REMOTE_AUTH_TOKEN)
        );
        assert!(!envelope.metadata.contains_key("value"));

        assert_eq!(redact_value(ENV_REMOTE_AUTH_TOKEN, "abc"), REDACTED_VALUE);
        assert_eq!(redact_value(ENV_LOG_LEVEL, "loud"), "loud");
        Ok(())
    }

    #[test]
    fn env_overrides_win_and_are_validated() -> Result<(), Box<dyn Error>> {
        let env = AppEnv {
            retry_max_attempts: Some(5),
            remote_auth_token: Some(SecretString::new("token")),
            ..AppEnv::default()
        };
        let config = apply_env_overrides(AppConfig::default(), &env)?;
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(
            config.remote.auth_token.as_ref().map(SecretString::expose),
            Some("token")
        );

        let env = AppEnv {
            retry_max_attempts: Some(11),
            ..AppEnv::default()
        };
        let error = apply_env_overrides(AppConfig::default(), &env).err();
        assert_eq!(
            error.map(|error| error.code),
            Some(ErrorCode::new("config", "invalid_limit"))
        );
        Ok(())
    }
}
