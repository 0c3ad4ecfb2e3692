//! fanout server binary
//!
//! Exit codes:
//!   0 - Clean shutdown
//!   1 - Configuration or server error

mod cli;

use clap::Parser;
use cli::Args;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fanout starting");

    let config = match args.load_config() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = fanout::api::start_api_server(config).await {
        tracing::error!(error = %e, "server failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber; RUST_LOG wins over `--log-level`
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
