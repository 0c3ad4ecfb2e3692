//! HTTP front end
//!
//! Every request path runs the aggregation handler, which reads its instructions
//! from the query string:
//!
//! - `requests` (required) - comma separated `id:url` pairs
//! - `timeout` - per-target timeout in milliseconds
//! - `type` - `json` (default) or `delimiter`
//! - `delimiter` - separator for `type=delimiter`
//!
//! `GET /health` is the only other route.

use crate::error::{Error, Result};
use crate::config::Config;
use axum::{Router, routing::get};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Create the router
///
/// # Routes
///
/// - `GET /health` - Health check
/// - any other path - fan out the `requests` in the query string and aggregate the answers
pub fn create_router(state: AppState) -> Router {
    let cors_enabled = state.config.server.cors_enabled;

    let router = Router::new()
        .route("/health", get(routes::health_check))
        .fallback(routes::aggregate)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors_enabled {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, config: Arc<Config>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = AppState::new(config)?;
    let app = create_router(state);

    let address = listener.local_addr().map_err(Error::Io)?;
    tracing::info!(address = %address, "fanout listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::ApiServerError(e.to_string()))?;

    tracing::info!("server stopped");
    Ok(())
}

/// Bind the configured address and serve until SIGINT/SIGTERM
///
/// # Example
///
/// ```no_run
/// use fanout::Config;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default().with_port(9000));
/// fanout::api::start_api_server(config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(config: Arc<Config>) -> Result<()> {
    let bind_address = config.server.bind_address;

    tracing::info!(address = %bind_address, "starting server");

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(Error::Io)?;

    serve(listener, config, crate::wait_for_signal()).await
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
