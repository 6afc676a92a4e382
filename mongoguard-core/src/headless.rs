// File: mongoguard-core/src/headless.rs

//! `headless.rs`
//! Convenience wrappers for one-shot sanitization outside any host framework.
//! Builds the options, runs the default engine and returns the result in a
//! single call, for scripts, tests and services that only have a JSON payload.

use anyhow::{Context, Result};

use crate::config::SanitizeConfig;
use crate::engines::default_engine::DefaultEngine;
use crate::options::SanitizeOptions;
use crate::value::Value;

/// Sanitizes `value` under `config` merged over the defaults.
///
/// # Arguments
///
/// * `config` - Partial configuration; `SanitizeConfig::default()` means all defaults.
/// * `value` - The payload to sanitize. It is not modified.
pub fn sanitize(config: &SanitizeConfig, value: &Value) -> Result<Value> {
    let options = SanitizeOptions::build(config).context("Failed to build sanitize options")?;
    Ok(DefaultEngine.sanitize_value(value, &options))
}

/// Same as [`sanitize`] for a `serde_json::Value` payload.
pub fn sanitize_json(config: &SanitizeConfig, payload: &serde_json::Value) -> Result<serde_json::Value> {
    let value = Value::from(payload.clone());
    Ok(sanitize(config, &value)?.to_json())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_headless_sanitize_json_defaults() -> Result<()> {
        let payload = json!({"user": {"username": "$admin", "$password": "$secre.t"}});
        let sanitized = sanitize_json(&SanitizeConfig::default(), &payload)?;
        assert_eq!(sanitized, json!({"user": {"username": "admin", "password": "secret"}}));
        Ok(())
    }

    #[test]
    fn test_headless_reports_bad_configuration() {
        let config = SanitizeConfig {
            patterns: Some(vec!["[".to_string()]),
            ..Default::default()
        };
        let err = sanitize_json(&config, &json!({})).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to build sanitize options"));
    }
}
