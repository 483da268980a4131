use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use protocol::EngineLimits;

use crate::error::{AgentError, Result};

pub const DEFAULT_LISTENER_MAX_BYTES: usize = 4096;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PeerConfig {
    /// Base URL of the directory server.
    pub api_url: String,
    /// Host the inbound listener binds to.
    pub listen_host: String,
    pub heartbeat_interval_ms: u64,
    /// Bound on one direct send, connect included.
    pub send_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_request_bytes: usize,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8080".to_string(),
            listen_host: "0.0.0.0".to_string(),
            heartbeat_interval_ms: 5000,
            send_timeout_ms: 3000,
            request_timeout_ms: 5000,
            max_request_bytes: DEFAULT_LISTENER_MAX_BYTES,
        }
    }
}

impl PeerConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| AgentError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| AgentError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Reads `PEER_CONFIG` if set, then applies the env overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var("PEER_CONFIG") {
            Ok(path) => Self::load_from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies `PEER_API_URL` and `PEER_LISTEN_HOST` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("PEER_API_URL") {
            self.api_url = url;
        }
        if let Ok(host) = std::env::var("PEER_LISTEN_HOST") {
            self.listen_host = host;
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn listener_limits(&self) -> EngineLimits {
        EngineLimits {
            max_request_bytes: self.max_request_bytes,
            ..EngineLimits::default()
        }
    }
}

/// Credentials and port the stdin driver logs in with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub password: String,
    pub port: u16,
}

impl Identity {
    /// Reads `PEER_USERNAME`, `PEER_PASSWORD` and `PEER_PORT`.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| AgentError::Config(format!("{} is not set", name)))
        };

        let port = var("PEER_PORT")?;
        Ok(Self {
            username: var("PEER_USERNAME")?,
            password: var("PEER_PASSWORD")?,
            port: port
                .parse()
                .map_err(|_| AgentError::Config(format!("Invalid PEER_PORT: {}", port)))?,
        })
    }
}
