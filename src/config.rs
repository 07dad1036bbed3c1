//! Configuration loading.
//!
//! Reads the monitor configuration from a JSON file and layers environment
//! overrides on top. The session token is never written to or read from the
//! file; it only comes from the environment (or the host, in the browser).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    DEFAULT_RESOURCE_FILES, DEFAULT_SERVER_URL, EVENT_LOG_CAPACITY, LIVE_WS_PATH,
    TICK_ERROR_LOG_INTERVAL,
};
use crate::engine::{AuthContext, Endpoint};

/// Invalid configuration values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `server_url` is blank.
    #[error("server_url must not be empty")]
    EmptyServerUrl,
    /// A URL could not be parsed.
    #[error("invalid URL {url:?}: {detail}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser detail.
        detail: String,
    },
    /// `event_log_capacity` is zero.
    #[error("event_log_capacity must be > 0")]
    ZeroEventLogCapacity,
    /// `tick_error_log_interval` is zero.
    #[error("tick_error_log_interval must be > 0")]
    ZeroTickErrorLogInterval,
}

/// Configuration for the live monitor.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorConfig {
    /// URL of the relay server.
    pub server_url: String,
    /// Path of the live WebSocket on the relay.
    pub ws_path: String,
    /// Base URL for engine REST calls. Defaults to `server_url`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Base URL of the resource pack files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_base: Option<String>,
    /// Resource pack file names.
    pub resource_files: Vec<String>,
    /// Event log capacity.
    pub event_log_capacity: usize,
    /// Consecutive tick failures between two logged ones.
    pub tick_error_log_interval: u32,
    /// Session token - NOT serialized.
    #[serde(skip)]
    pub token: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            ws_path: LIVE_WS_PATH.to_string(),
            api_base: None,
            resource_base: None,
            resource_files: DEFAULT_RESOURCE_FILES
                .iter()
                .map(|f| (*f).to_string())
                .collect(),
            event_log_capacity: EVENT_LOG_CAPACITY,
            tick_error_log_interval: TICK_ERROR_LOG_INTERVAL,
            token: String::new(),
        }
    }
}

impl MonitorConfig {
    /// Platform config file location (`<config_dir>/live-monitor/config.json`).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_path() -> Result<std::path::PathBuf> {
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join("live-monitor")
            .join("config.json"))
    }

    /// Load from `path` (missing file yields defaults), then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => Self::load_from_file(path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply `LIVE_MONITOR_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparseable numbers are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(server_url) = lookup("LIVE_MONITOR_SERVER_URL") {
            self.server_url = server_url;
        }

        if let Some(api_base) = lookup("LIVE_MONITOR_API_BASE") {
            self.api_base = Some(api_base);
        }

        if let Some(resource_base) = lookup("LIVE_MONITOR_RESOURCE_BASE") {
            self.resource_base = Some(resource_base);
        }

        if let Some(token) = lookup("LIVE_MONITOR_TOKEN") {
            self.token = token;
        }

        if let Some(capacity) = lookup("LIVE_MONITOR_EVENT_LOG_CAPACITY") {
            if let Ok(capacity) = capacity.parse::<usize>() {
                self.event_log_capacity = capacity;
            }
        }

        if let Some(interval) = lookup("LIVE_MONITOR_TICK_ERROR_LOG_INTERVAL") {
            if let Ok(interval) = interval.parse::<u32>() {
                self.tick_error_log_interval = interval;
            }
        }
    }

    /// Check values that would make the monitor unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::EmptyServerUrl);
        }
        if self.event_log_capacity == 0 {
            return Err(ConfigError::ZeroEventLogCapacity);
        }
        if self.tick_error_log_interval == 0 {
            return Err(ConfigError::ZeroTickErrorLogInterval);
        }
        Ok(())
    }

    /// Authentication context from the configured token, if any.
    pub fn auth(&self) -> Option<AuthContext> {
        AuthContext::new(self.token.clone())
    }

    /// Base URL for engine REST calls.
    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(&self.server_url)
    }

    /// Derive the live channel endpoint.
    ///
    /// The token travels as a `token` query parameter because browsers
    /// cannot set headers on a WebSocket upgrade.
    pub fn live_endpoint(&self, auth: &AuthContext) -> Result<Endpoint, ConfigError> {
        let base = http_to_ws_scheme(self.server_url.trim_end_matches('/'));
        let raw = format!("{base}/{}", self.ws_path.trim_start_matches('/'));

        let mut url = reqwest::Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl {
            url: raw.clone(),
            detail: e.to_string(),
        })?;
        url.query_pairs_mut().append_pair("token", auth.token());

        Ok(Endpoint {
            ws_url: url.to_string(),
            api_base: self.api_base().trim_end_matches('/').to_string(),
        })
    }
}

/// Convert an HTTP(S) URL to WS(S) scheme.
///
/// Passes `ws://` and `wss://` through unchanged.
#[must_use]
pub fn http_to_ws_scheme(url: &str) -> String {
    if url.starts_with("wss://") || url.starts_with("ws://") {
        url.to_string()
    } else if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.server_url, "http://localhost:3080");
        assert_eq!(config.ws_path, "/ws/live");
        assert_eq!(config.event_log_capacity, 500);
        assert_eq!(config.tick_error_log_interval, 60);
        assert_eq!(config.resource_files.len(), 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_excludes_token() {
        let config = MonitorConfig {
            token: "secret_token".to_string(),
            ..MonitorConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret_token"));
        assert!(!json.contains("\"token\""));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: MonitorConfig =
            serde_json::from_str(r#"{"server_url":"https://relay.example.com"}"#).unwrap();
        assert_eq!(config.server_url, "https://relay.example.com");
        assert_eq!(config.ws_path, "/ws/live");
        assert_eq!(config.event_log_capacity, 500);
    }

    #[test]
    fn test_overrides_apply_and_ignore_bad_numbers() {
        let mut config = MonitorConfig::default();
        config.apply_overrides(lookup(&[
            ("LIVE_MONITOR_SERVER_URL", "https://relay.example.com"),
            ("LIVE_MONITOR_TOKEN", "tok"),
            ("LIVE_MONITOR_RESOURCE_BASE", "https://cdn.example.com/pack"),
            ("LIVE_MONITOR_EVENT_LOG_CAPACITY", "not-a-number"),
            ("LIVE_MONITOR_TICK_ERROR_LOG_INTERVAL", "30"),
        ]));
        assert_eq!(config.server_url, "https://relay.example.com");
        assert_eq!(config.token, "tok");
        assert_eq!(
            config.resource_base.as_deref(),
            Some("https://cdn.example.com/pack")
        );
        assert_eq!(config.event_log_capacity, 500);
        assert_eq!(config.tick_error_log_interval, 30);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = MonitorConfig {
            event_log_capacity: 0,
            ..MonitorConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroEventLogCapacity));

        let config = MonitorConfig {
            tick_error_log_interval: 0,
            ..MonitorConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroTickErrorLogInterval));

        let config = MonitorConfig {
            server_url: "  ".into(),
            ..MonitorConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyServerUrl));
    }

    #[test]
    fn test_live_endpoint_converts_scheme_and_appends_token() {
        let config = MonitorConfig {
            server_url: "https://relay.example.com/".into(),
            ..MonitorConfig::default()
        };
        let auth = AuthContext::new("a b&c").unwrap();
        let endpoint = config.live_endpoint(&auth).unwrap();
        assert_eq!(
            endpoint.ws_url,
            "wss://relay.example.com/ws/live?token=a+b%26c"
        );
        assert_eq!(endpoint.api_base, "https://relay.example.com");
    }

    #[test]
    fn test_live_endpoint_uses_api_base_override() {
        let config = MonitorConfig {
            api_base: Some("https://api.example.com".into()),
            ..MonitorConfig::default()
        };
        let endpoint = config.live_endpoint(&AuthContext::new("t").unwrap()).unwrap();
        assert_eq!(endpoint.ws_url, "ws://localhost:3080/ws/live?token=t");
        assert_eq!(endpoint.api_base, "https://api.example.com");
    }

    #[test]
    fn test_live_endpoint_rejects_garbage_url() {
        let config = MonitorConfig {
            server_url: "not a url".into(),
            ..MonitorConfig::default()
        };
        let err = config.live_endpoint(&AuthContext::new("t").unwrap());
        assert!(matches!(err, Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn test_http_to_ws_scheme() {
        assert_eq!(http_to_ws_scheme("https://example.com"), "wss://example.com");
        assert_eq!(http_to_ws_scheme("http://localhost:3000"), "ws://localhost:3000");
        assert_eq!(http_to_ws_scheme("wss://example.com/x"), "wss://example.com/x");
        assert_eq!(http_to_ws_scheme("ws://localhost/x"), "ws://localhost/x");
    }
}
