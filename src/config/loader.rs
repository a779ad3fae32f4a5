//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{parse_duration, GatewayConfig};
use crate::config::validation::ValidationError;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: defaults, then the optional TOML file, then the process environment.
///
/// Semantic validation happens separately, when the server is built.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// [`load_config`] with an explicit variable lookup in place of the process environment.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };
    apply_env_overrides(&mut config, lookup);
    Ok(config)
}

/// Overlay environment variables onto `config`.
///
/// Blank values are ignored. Values that fail to parse are skipped with a warning
/// and the existing setting is kept.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(port) = get("PROXY_PORT") {
        match port.trim().parse() {
            Ok(port) => config.proxy_port = port,
            Err(_) => tracing::warn!(key = "PROXY_PORT", value = %port, "Ignoring invalid port"),
        }
    }
    if let Some(url) = get("FRONTEND_URL").or_else(|| get("NEXTJS_URL")) {
        config.frontend_url = url;
    }
    if let Some(url) = get("API_URL") {
        config.api_url = url;
    }
    if let Some(url) = lookup("BASE_URL") {
        // An explicitly empty BASE_URL switches the public identity off.
        config.base_url = url;
    }
    if let Some(dir) = get("UPLOADS_DIR") {
        config.uploads_dir = dir.into();
    }

    let timeouts = &mut config.timeouts;
    for (key, slot) in [
        ("READ_TIMEOUT", &mut timeouts.read),
        ("WRITE_TIMEOUT", &mut timeouts.write),
        ("IDLE_TIMEOUT", &mut timeouts.idle),
        ("UPLOAD_READ_TIMEOUT", &mut timeouts.upload_read),
    ] {
        if let Some(raw) = get(key) {
            match parse_duration(&raw) {
                Some(value) => *slot = value,
                None => tracing::warn!(key, value = %raw, "Ignoring invalid duration"),
            }
        }
    }

    if let Some(raw) = get("LOG_REQUESTS") {
        match parse_bool(&raw) {
            Some(value) => config.log_requests = value,
            None => tracing::warn!(key = "LOG_REQUESTS", value = %raw, "Ignoring invalid boolean"),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::time::Duration;

    fn overlay(vars: &[(&str, &str)]) -> GatewayConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, |key| vars.get(key).cloned());
        config
    }

    #[test]
    fn env_overrides_replace_defaults() {
        let config = overlay(&[
            ("PROXY_PORT", "9090"),
            ("NEXTJS_URL", "http://web:3000"),
            ("API_URL", "http://api:3333"),
            ("BASE_URL", "https://example.com"),
            ("UPLOAD_READ_TIMEOUT", "20m"),
            ("LOG_REQUESTS", "false"),
        ]);

        assert_eq!(config.proxy_port, 9090);
        assert_eq!(config.frontend_url, "http://web:3000");
        assert_eq!(config.api_url, "http://api:3333");
        assert_eq!(config.base_url, "https://example.com");
        assert_eq!(config.timeouts.upload_read, Duration::from_secs(1200));
        assert!(!config.log_requests);
    }

    #[test]
    fn frontend_url_wins_over_legacy_alias() {
        let config = overlay(&[("FRONTEND_URL", "http://a:1"), ("NEXTJS_URL", "http://b:2")]);
        assert_eq!(config.frontend_url, "http://a:1");
    }

    #[test]
    fn invalid_values_keep_previous_setting() {
        let config = overlay(&[
            ("PROXY_PORT", "eighty"),
            ("READ_TIMEOUT", "soon"),
            ("LOG_REQUESTS", "maybe"),
        ]);
        let defaults = GatewayConfig::default();

        assert_eq!(config.proxy_port, defaults.proxy_port);
        assert_eq!(config.timeouts.read, defaults.timeouts.read);
        assert_eq!(config.log_requests, defaults.log_requests);
    }

    #[test]
    fn empty_base_url_disables_it() {
        let config = overlay(&[("BASE_URL", "")]);
        assert_eq!(config.base_url(), None);
    }

    #[test]
    fn loads_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_url = \"http://api.internal:4000\"\n[timeouts]\nread = \"12s\"").unwrap();

        let config = load_config_with(Some(file.path()), |_| None).unwrap();
        assert_eq!(config.timeouts.read, Duration::from_secs(12));
        assert_eq!(config.api_url, "http://api.internal:4000");
        assert_eq!(config.frontend_url, GatewayConfig::default().frontend_url);
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_url = \"http://api.internal:4000\"\n[timeouts]\nread = \"12s\"").unwrap();

        let config = load_config_with(Some(file.path()), |key| match key {
            "API_URL" => Some("http://api.override:5000".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.api_url, "http://api.override:5000");
        assert_eq!(config.timeouts.read, Duration::from_secs(12));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "proxy_port = \"not a number\"").unwrap();

        let err = load_config_with(Some(file.path()), |_| None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
