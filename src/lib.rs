//! # fanout
//!
//! Concurrent HTTP fan-out with ordered aggregation.
//!
//! A batch of `id:url` targets is fetched in parallel, each under its own timeout, and
//! the answers are rendered as one response in the order the targets were given,
//! whatever order they completed in. Output is either a JSON array or delimiter
//! separated text blocks.
//!
//! The crate works as a library (see [`Aggregator`]) and as an HTTP service
//! (see [`api`]) that takes its targets from the query string.
//!
//! ## Quick Start
//!
//! ```no_run
//! use fanout::{Aggregator, TargetDescriptor};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut aggregator = Aggregator::new([
//!         TargetDescriptor::new("users", "http://localhost:9000/users"),
//!         TargetDescriptor::new("orders", "http://localhost:9001/orders"),
//!     ])?;
//!     aggregator.set_timeout(Duration::from_millis(500));
//!     aggregator.use_delimiter("---");
//!
//!     let mut out = Vec::new();
//!     let summary = aggregator.process(&mut out).await?;
//!     println!("{} of {} succeeded", summary.succeeded, summary.total);
//!     print!("{}", String::from_utf8_lossy(&out));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Ordered concurrent fan-out
pub mod aggregator;
/// HTTP service
pub mod api;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Single-target fetch units
pub mod fetch;
/// Output formatters
pub mod output;
/// Core types
pub mod types;

#[cfg(test)]
mod test_helpers;

// Re-export commonly used types
pub use aggregator::Aggregator;
pub use config::{Config, FetchConfig, ServerConfig};
pub use error::{Error, FetchError, Result, ToHttpStatus};
pub use fetch::FetchUnit;
pub use output::{DelimitedFormatter, Formatter, OutputFormatter, StructuredFormatter};
pub use types::{BatchSummary, OutputMode, RecordOutcome, ResultRecord, TargetDescriptor};

/// Resolve once the process is asked to stop
///
/// - **Unix:** SIGTERM or SIGINT. If either handler cannot be registered, falls back to
///   Ctrl+C.
/// - **Windows/other:** Ctrl+C via `tokio::signal::ctrl_c()`.
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "could not register signal handlers, using ctrl_c fallback");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl+C");
            }
        }
    }
}

/// Resolve once the process is asked to stop (Ctrl+C)
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C, shutting down"),
        Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl+C"),
    }
}
