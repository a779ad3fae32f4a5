//! Front gateway.
//!
//! One public origin in front of a server-rendered front-end and an API.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                  GATEWAY                     │
//!   Client Request       │  ┌────────┐   ┌──────────┐                   │
//!   ─────────────────────┼─▶│  http  │──▶│ routing  │                   │
//!                        │  │ server │   │  table   │                   │
//!                        │  └────────┘   └────┬─────┘                   │
//!                        │       ┌────────────┼──────────────┐         │
//!                        │       ▼            ▼              ▼         │
//!                        │  /api/upload     /f/        /api/, rest    │
//!                        │  ┌────────┐  ┌──────────┐  ┌───────────┐    │
//!                        │  │rewrite │  │  static  │  │ rewrite + │    │
//!                        │  │ + pool │  │  assets  │  │   pools   │────┼──▶ API / Front-end
//!                        │  └────────┘  └──────────┘  └───────────┘    │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use front_gateway::config::load_config;
use front_gateway::http::HttpServer;
use front_gateway::lifecycle::{signals, startup, Shutdown};
use front_gateway::observability::logging::{init_logging, LogFormat};
use front_gateway::observability::metrics;

#[derive(Debug, Parser)]
#[command(name = "front-gateway", version, about = "Single-origin gateway for a front-end and its API")]
struct Cli {
    /// Optional TOML configuration file; environment variables override it.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "front-gateway starting");

    let config = load_config(cli.config.as_deref()).inspect_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
    })?;

    let server = HttpServer::new(config).inspect_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
    })?;
    let config = server.config();

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(config.bind_address()).await?;
    startup::log_startup(config, server.uploads_root());

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
