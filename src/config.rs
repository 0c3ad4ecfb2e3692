//! Configuration types for fanout

use crate::error::{Error, Result};
use crate::output::DEFAULT_DELIMITER;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, time::Duration};

/// Default per-target timeout (10 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default listening port
pub const DEFAULT_PORT: u16 = 8080;

/// Main configuration
///
/// Every field has a default, so an empty TOML file (or no file at all) yields a
/// working server on `0.0.0.0:8080`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Outbound fetch defaults
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// Listener configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable permissive CORS for browser callers (default: false)
    #[serde(default)]
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: false,
        }
    }
}

/// Defaults applied to every aggregation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-target timeout when the caller does not send one (default: 10000 ms)
    #[serde(default = "default_timeout", with = "duration_ms_serde")]
    pub default_timeout: Duration,

    /// Separator used by delimited output when the caller does not send one
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// User-Agent header sent with every outbound request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// How long idle pooled connections are kept (default: 90000 ms)
    #[serde(default = "default_pool_idle_timeout", with = "duration_ms_serde")]
    pub pool_idle_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            default_timeout: default_timeout(),
            delimiter: default_delimiter(),
            user_agent: default_user_agent(),
            pool_idle_timeout: default_pool_idle_timeout(),
        }
    }
}

impl FetchConfig {
    /// Build the shared outbound HTTP client from these settings
    ///
    /// No client-level timeout is set; every fetch unit enforces its own.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .pool_idle_timeout(self.pool_idle_timeout)
            .build()?;
        Ok(client)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration file");
        Ok(config)
    }

    /// Parse configuration from TOML text and validate it
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| Error::Config {
            message: e.to_string(),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.fetch.default_timeout.is_zero() {
            return Err(Error::config(
                "fetch.default_timeout",
                "must be greater than zero",
            ));
        }
        if self.fetch.user_agent.trim().is_empty() {
            return Err(Error::config("fetch.user_agent", "must not be empty"));
        }
        Ok(())
    }

    /// Replace the port of the bind address, keeping the host
    pub fn with_port(mut self, port: u16) -> Self {
        self.server.bind_address.set_port(port);
        self
    }
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

fn default_user_agent() -> String {
    concat!("fanout/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_pool_idle_timeout() -> Duration {
    Duration::from_secs(90)
}

// Durations are written as integer milliseconds
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
