use std::net::SocketAddr;

use anyhow::Result;
use notecast_broadcast::BroadcastConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    pub broadcast: BroadcastConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let listen_addr = std::env::var("NOTECAST_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()?;

        let log_level =
            std::env::var("NOTECAST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let broadcast = BroadcastConfig::from_env()?;

        Ok(Self {
            listen_addr,
            log_level,
            broadcast,
        })
    }
}
