use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use protocol::{EngineLimits, DEFAULT_MAX_REQUEST_BYTES};

use crate::db::User;
use crate::error::{DirectoryError, Result};

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: ListenConfig,
    /// Directory served for paths no handler claims, e.g. `login.html`.
    pub static_dir: Option<PathBuf>,
    pub users: Vec<UserConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
    pub max_request_bytes: usize,
    pub read_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UserConfig {
    pub username: String,
    pub password: String,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            read_timeout_ms: 5000,
        }
    }
}

impl ServerConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| DirectoryError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ServerConfig = toml::from_str(content)
            .map_err(|e| DirectoryError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Applies `SERVER_HOST` and `SERVER_PORT` when set.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.listen.host = host;
        }
        if let Ok(port) = std::env::var("SERVER_PORT") {
            self.listen.port = port
                .parse()
                .map_err(|_| DirectoryError::Config(format!("Invalid SERVER_PORT: {}", port)))?;
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen.host, self.listen.port)
    }

    pub fn engine_limits(&self) -> EngineLimits {
        EngineLimits {
            max_request_bytes: self.listen.max_request_bytes,
            read_timeout: Duration::from_millis(self.listen.read_timeout_ms),
        }
    }

    pub fn users(&self) -> Vec<User> {
        self.users
            .iter()
            .map(|u| User::new(&u.username, &u.password))
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.listen.max_request_bytes == 0 {
            return Err(DirectoryError::Config(
                "listen.max_request_bytes must be positive".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for user in &self.users {
            if user.username.is_empty() {
                return Err(DirectoryError::Config("user with empty username".to_string()));
            }
            if !seen.insert(user.username.as_str()) {
                return Err(DirectoryError::Config(format!(
                    "duplicate user {}",
                    user.username
                )));
            }
        }
        Ok(())
    }
}
