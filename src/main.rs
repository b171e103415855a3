//! Strings Service
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ axum (request id, trace, timeout, catch panic)
//!                         │
//!                         ▼
//!                  ┌──────────────┐   preflight
//!                  │ cross-origin │ ─────────────┐
//!                  └──────┬───────┘              │
//!                         ▼                      │
//!                  ┌──────────────┐  malformed   │
//!                  │ body decoder │ ─────────────┤
//!                  └──────┬───────┘              │
//!                         ▼                      │
//!                  ┌──────────────┐   handler    │
//!                  │   routing    │ ─────────────┤
//!                  └──────┬───────┘              │
//!                         ▼                      │
//!                  ┌──────────────┐              │
//!                  │ fallback 404 │ ─────────────┤
//!                  └──────────────┘              ▼
//!     Client Response ◀──────────── merge cross-origin headers
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use strings_service::config::{self, ServiceConfig};
use strings_service::observability::{logging, metrics};
use strings_service::{strings, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "strings-service")]
#[command(about = "JSON-over-HTTP service for the strings resource", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        config::validation::validate_config(&config)
            .map_err(config::ConfigError::Validation)?;
    }

    logging::init_logging(&config.observability)?;

    tracing::info!("strings-service v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        max_body_size = config.body.max_body_size,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Routes are frozen before the listener accepts traffic
    let routes = strings::registry()?.freeze();

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    shutdown.trigger_on_signal();

    HttpServer::new(config, routes)
        .run(listener, server_shutdown)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
