//! Config loading helpers for CLI surfaces.

use crate::{InfraResult, validate_env_parsing};
use rehearse_config::{load_app_config_from_path, to_pretty_json};
use std::collections::BTreeMap;
use std::path::Path;

/// Load and validate the effective config, returning deterministic pretty JSON.
pub fn load_effective_config_json(
    env: &BTreeMap<String, String>,
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> InfraResult<String> {
    let env = validate_env_parsing(env)?;
    let config = load_app_config_from_path(config_path, overrides_json, &env)?;
    to_pretty_json(&config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rehearse_config::ENV_REMOTE_AUTH_TOKEN;

    #[test]
    fn effective_config_redacts_secrets() -> InfraResult<()> {
        let env = BTreeMap::from([(ENV_REMOTE_AUTH_TOKEN.to_string(), "sk-live-123".to_string())]);
        let json = load_effective_config_json(&env, None, Some(r#"{ "retry": { "maxAttempts": 4 } }"#))?;
        assert!(!json.contains("sk-live-123"));
        assert!(json.contains("\"maxAttempts\": 4"));
        Ok(())
    }
}
