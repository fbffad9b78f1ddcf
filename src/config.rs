use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use dotenv::dotenv;

use crate::error::ConfigError;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:50051";
pub const DEFAULT_POLICY_TIMEOUT_MS: u64 = 50;

/// Settings for the navigation server, read from the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub policy_timeout: Duration,
    /// Trained policy checkpoint; only used when built with the `rl` feature
    pub model_path: Option<PathBuf>,
}

impl ServerConfig {
    /// Load `.env` (if present) and read the `ROBONAV_*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = match lookup("ROBONAV_LISTEN_ADDR") {
            Some(value) => parse("ROBONAV_LISTEN_ADDR", value)?,
            None => DEFAULT_LISTEN_ADDR
                .parse()
                .map_err(|_| invalid("ROBONAV_LISTEN_ADDR", DEFAULT_LISTEN_ADDR))?,
        };

        let timeout_ms = match lookup("ROBONAV_POLICY_TIMEOUT_MS") {
            Some(value) => parse::<u64>("ROBONAV_POLICY_TIMEOUT_MS", value)?,
            None => DEFAULT_POLICY_TIMEOUT_MS,
        };

        let model_path = lookup("ROBONAV_MODEL_PATH")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            listen_addr,
            policy_timeout: Duration::from_millis(timeout_ms),
            model_path,
        })
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue { key, value })
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    }
}
