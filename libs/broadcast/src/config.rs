//! Broadcaster configuration.

use std::time::Duration;

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Where and how to reach the HTTP events endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastConfig {
    /// Base URL of the broadcast server, without trailing slash.
    pub base_url: String,

    /// Application id used in the events path.
    pub app_id: String,

    /// Optional bearer token.
    pub token: Option<String>,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8081".to_string(),
            app_id: "notecast".to_string(),
            token: None,
            timeout: Duration::from_millis(5000),
        }
    }
}

impl BroadcastConfig {
    /// Reads `NOTECAST_BROADCAST_*` variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let base_url = lookup("NOTECAST_BROADCAST_URL").unwrap_or(defaults.base_url);
        let app_id = lookup("NOTECAST_BROADCAST_APP_ID").unwrap_or(defaults.app_id);
        let token = lookup("NOTECAST_BROADCAST_TOKEN").filter(|t| !t.is_empty());

        let timeout = match lookup("NOTECAST_BROADCAST_TIMEOUT_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidValue {
                    var: "NOTECAST_BROADCAST_TIMEOUT_MS",
                    value: raw,
                })?,
            None => defaults.timeout,
        };

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id,
            token,
            timeout,
        })
    }

    /// URL of the events endpoint.
    pub fn events_url(&self) -> String {
        format!(
            "{}/apps/{}/events",
            self.base_url.trim_end_matches('/'),
            self.app_id
        )
    }
}
