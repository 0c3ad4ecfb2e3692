//! Application state for the HTTP server

use crate::config::Config;
use crate::error::Result;
use std::sync::Arc;

/// Shared state handed to every handler
///
/// Cloned per request; both fields are cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Outbound client shared by all aggregations (one connection pool)
    pub client: reqwest::Client,

    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create state, building the outbound client from `config.fetch`
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let client = config.fetch.build_client()?;
        Ok(Self { client, config })
    }
}
