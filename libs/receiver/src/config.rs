//! Receiver configuration.

use std::time::Duration;

use crate::{ChannelPlan, ConfigError, StoreConfig};

/// Default capacity of the refresh signal channel.
pub const DEFAULT_REFRESH_CAPACITY: usize = 16;

/// Configuration of a [`crate::NotificationSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverConfig {
    pub store: StoreConfig,
    pub plan: ChannelPlan,

    /// Skip notifications for notes authored by the session's own identity.
    pub suppress_own_notes: bool,

    /// Buffered refresh signals per listener before the slowest one lags.
    pub refresh_capacity: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            plan: ChannelPlan::default(),
            suppress_own_notes: false,
            refresh_capacity: DEFAULT_REFRESH_CAPACITY,
        }
    }
}

impl ReceiverConfig {
    /// Loads configuration from environment variables, falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(ms) = parse(&lookup, "NOTECAST_NOTIFICATION_TTL_MS")? {
            config.store.ttl = Duration::from_millis(ms);
        }
        if let Some(max) = parse(&lookup, "NOTECAST_MAX_NOTIFICATIONS")? {
            if max == 0 {
                return Err(ConfigError::InvalidValue {
                    var: "NOTECAST_MAX_NOTIFICATIONS",
                    value: "0".to_string(),
                });
            }
            config.store.max_retained = max;
        }
        if let Some(suppress) = parse(&lookup, "NOTECAST_SUPPRESS_OWN_NOTES")? {
            config.suppress_own_notes = suppress;
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}
