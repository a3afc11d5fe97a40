//! Engine configuration surface.
//!
//! # Responsibility
//! - Carry the record-keeping service base URL and autosave policy.
//! - Load values from `VISITNOTE_*` environment variables or a TOML section
//!   embedded in host configuration.
//!
//! # Invariants
//! - `autosave_interval_ms` and `request_timeout_secs` are strictly positive.
//! - `base_url` is an absolute `http`/`https` URL.
//!
//! # Environment variables
//! - `VISITNOTE_BASE_URL` (default `http://localhost:8000`)
//! - `VISITNOTE_AUTOSAVE_ENABLED` (`true|false`, default `false`)
//! - `VISITNOTE_AUTOSAVE_INTERVAL_MS` (default `30000`)
//! - `VISITNOTE_REQUEST_TIMEOUT_SECS` (default `30`)
//! - `VISITNOTE_DRAFT_DB_PATH` (optional)
//! - `VISITNOTE_LOG_LEVEL` (default per build mode)

use crate::logging::{default_log_level, init_logging};
use crate::service::section_data_store::AutosaveConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_AUTOSAVE_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const ENV_BASE_URL: &str = "VISITNOTE_BASE_URL";
const ENV_AUTOSAVE_ENABLED: &str = "VISITNOTE_AUTOSAVE_ENABLED";
const ENV_AUTOSAVE_INTERVAL_MS: &str = "VISITNOTE_AUTOSAVE_INTERVAL_MS";
const ENV_REQUEST_TIMEOUT_SECS: &str = "VISITNOTE_REQUEST_TIMEOUT_SECS";
const ENV_DRAFT_DB_PATH: &str = "VISITNOTE_DRAFT_DB_PATH";
const ENV_LOG_LEVEL: &str = "VISITNOTE_LOG_LEVEL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("invalid config document: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Runtime settings for one embedding of the note engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub autosave_enabled: bool,
    #[serde(default = "default_autosave_interval_ms")]
    pub autosave_interval_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Local draft database file. In-memory drafts when unset.
    #[serde(default)]
    pub draft_db_path: Option<PathBuf>,
    #[serde(default = "default_log_level_string")]
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            autosave_enabled: false,
            autosave_interval_ms: DEFAULT_AUTOSAVE_INTERVAL_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            draft_db_path: None,
            log_level: default_log_level_string(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// Unset variables keep their defaults; set variables must parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_BASE_URL) {
            config.base_url = value.trim().to_string();
        }
        if let Some(value) = lookup(ENV_AUTOSAVE_ENABLED) {
            config.autosave_enabled = parse_bool(ENV_AUTOSAVE_ENABLED, &value)?;
        }
        if let Some(value) = lookup(ENV_AUTOSAVE_INTERVAL_MS) {
            config.autosave_interval_ms = parse_u64(ENV_AUTOSAVE_INTERVAL_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout_secs = parse_u64(ENV_REQUEST_TIMEOUT_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_DRAFT_DB_PATH) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                config.draft_db_path = Some(PathBuf::from(trimmed));
            }
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            config.log_level = value.trim().to_string();
        }

        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document holding engine settings at its top level.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                name: "base_url",
                value: self.base_url.clone(),
                reason: "expected an absolute http(s) URL",
            });
        }
        if self.autosave_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                name: "autosave_interval_ms",
                value: "0".to_string(),
                reason: "must be greater than zero",
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "request_timeout_secs",
                value: "0".to_string(),
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_millis(self.autosave_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Starts engine logging at the configured level under `log_dir`.
    pub fn init_logging(&self, log_dir: &str) -> Result<(), String> {
        init_logging(&self.log_level, log_dir)
    }

    /// Default autosave policy: local-draft fallback, no endpoint or callback.
    pub fn autosave_config(&self) -> AutosaveConfig {
        AutosaveConfig {
            enabled: self.autosave_enabled,
            interval: self.autosave_interval(),
            ..AutosaveConfig::default()
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_autosave_interval_ms() -> u64 {
    DEFAULT_AUTOSAVE_INTERVAL_MS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_log_level_string() -> String {
    default_log_level().to_string()
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
            reason: "expected true|false",
        }),
    }
}

fn parse_u64(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue {
            name,
            value: value.to_string(),
            reason: "expected a non-negative integer",
        })
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig, DEFAULT_AUTOSAVE_INTERVAL_MS, DEFAULT_BASE_URL};
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_service_contract() {
        let config = EngineConfig::from_lookup(|_| None).expect("defaults should be valid");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.autosave_interval_ms, DEFAULT_AUTOSAVE_INTERVAL_MS);
        assert_eq!(config.autosave_interval(), Duration::from_secs(30));
        assert!(!config.autosave_enabled);
        assert!(config.draft_db_path.is_none());
    }

    #[test]
    fn env_values_override_defaults() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("VISITNOTE_BASE_URL", " https://records.example.org "),
            ("VISITNOTE_AUTOSAVE_ENABLED", "yes"),
            ("VISITNOTE_AUTOSAVE_INTERVAL_MS", "1500"),
            ("VISITNOTE_DRAFT_DB_PATH", "/tmp/drafts.sqlite3"),
        ]))
        .expect("env config should load");

        assert_eq!(config.base_url, "https://records.example.org");
        assert!(config.autosave_enabled);
        assert_eq!(config.autosave_interval(), Duration::from_millis(1500));
        assert_eq!(
            config.draft_db_path.as_deref(),
            Some(std::path::Path::new("/tmp/drafts.sqlite3"))
        );
    }

    #[test]
    fn rejects_zero_interval_and_bad_bool() {
        let err = EngineConfig::from_lookup(lookup_from(&[(
            "VISITNOTE_AUTOSAVE_INTERVAL_MS",
            "0",
        )]))
        .expect_err("zero interval must be rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                name: "autosave_interval_ms",
                ..
            }
        ));

        let err = EngineConfig::from_lookup(lookup_from(&[("VISITNOTE_AUTOSAVE_ENABLED", "maybe")]))
            .expect_err("unknown bool must be rejected");
        assert!(err.to_string().contains("VISITNOTE_AUTOSAVE_ENABLED"));
    }

    #[test]
    fn toml_document_fills_missing_fields_with_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            base_url = "http://127.0.0.1:9000"
            autosave_enabled = true
            "#,
        )
        .expect("toml should parse");
        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        assert!(config.autosave_enabled);
        assert_eq!(config.autosave_interval_ms, DEFAULT_AUTOSAVE_INTERVAL_MS);

        let autosave = config.autosave_config();
        assert!(autosave.enabled);
        assert!(autosave.endpoint.is_none());
    }

    #[test]
    fn init_logging_uses_configured_level() {
        let config = EngineConfig::from_lookup(lookup_from(&[("VISITNOTE_LOG_LEVEL", "verbose")]))
            .expect("log level is checked when logging starts");
        assert_eq!(config.log_level, "verbose");

        let dir = tempfile::tempdir().expect("temp dir");
        let log_dir = dir.path().to_str().expect("utf-8 path");
        let err = config
            .init_logging(log_dir)
            .expect_err("unknown level must be rejected");
        assert!(err.contains("unsupported log level `verbose`"));
    }

    #[test]
    fn toml_rejects_relative_base_url() {
        let err = EngineConfig::from_toml_str(r#"base_url = "records.local""#)
            .expect_err("relative base url must be rejected");
        assert!(err.to_string().contains("base_url"));
    }
}
