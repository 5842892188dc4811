use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

use pingy_thingy::config::{AppConfig, LogFormat};
use pingy_thingy::http::{AppState, HttpServer};
use pingy_thingy::telemetry;

/// Webhook API service with fixed-window admission control.
#[derive(Debug, Parser)]
#[command(name = "pingy-thingy", version, about)]
struct Cli {
    /// Path to a YAML or TOML configuration file
    #[arg(short, long, env = "PINGY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind_addr = bind;
    }
    if cli.json_logs {
        config.logging.format = LogFormat::Json;
    }

    // Initialize tracing
    telemetry::init(&config.logging);

    info!("Starting PingyThingy API");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        bind_addr = %config.server.bind_addr,
        development = config.development.enabled,
        "Configuration loaded"
    );

    let addr = config.server.bind_addr;
    let state = Arc::new(AppState::new(config)?);

    HttpServer::new(addr, state)
        .serve_with_shutdown(shutdown_signal())
        .await?;

    info!("PingyThingy API stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
