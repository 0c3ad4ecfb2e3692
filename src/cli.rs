//! Command-line interface argument parsing.

use clap::Parser;
use fanout::{Config, Result};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// fanout - concurrent HTTP fan-out aggregator
///
/// Serves every path; the `requests` query parameter lists the targets.
///
/// Examples:
///   fanout 8080
///   fanout --config fanout.toml
///   curl 'http://localhost:8080/?requests=a:http://svc-a/x,b:http://svc-b/y&timeout=500'
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(value_name = "PORT", env = "FANOUT_PORT")]
    pub port: Option<u16>,

    /// Interface to bind (overrides the config file)
    #[arg(long, value_name = "ADDR", env = "FANOUT_HOST")]
    pub host: Option<IpAddr>,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE", env = "FANOUT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Default per-target timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Log filter, e.g. `info` or `fanout=debug,tower_http=debug`
    ///
    /// RUST_LOG takes precedence when set.
    #[arg(long, default_value = "info", value_name = "FILTER")]
    pub log_level: String,

    /// Enable permissive CORS headers
    #[arg(long)]
    pub cors: bool,
}

impl Args {
    /// Load the configuration file (or defaults) and apply command-line overrides
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if let Some(host) = self.host {
            config.server.bind_address = SocketAddr::new(host, config.server.bind_address.port());
        }
        if let Some(ms) = self.timeout_ms {
            config.fetch.default_timeout = Duration::from_millis(ms);
        }
        if self.cors {
            config.server.cors_enabled = true;
        }

        config.validate()?;
        Ok(config)
    }
}
