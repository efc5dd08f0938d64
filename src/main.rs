use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use anoto::config::Config;
use anoto::AppState;

#[derive(Parser, Debug)]
#[command(name = "anoto")]
#[command(author, version, about = "GitHub App bot that pushes automated improvements to pull requests", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "anoto.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Anoto v{}", env!("CARGO_PKG_VERSION"));

    // Read credentials up front: a missing or unreadable key file fails
    // here, not on the first delivery.
    let private_key = config.read_private_key()?;

    // Ensure the working directory exists
    tokio::fs::create_dir_all(&config.server.work_dir).await?;

    let state = Arc::new(AppState::new(config.clone(), private_key));
    let app = anoto::api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Webhook server listening on http://{}", addr);
    if config.webhooks.capture_payloads {
        tracing::warn!("Capture mode enabled: payloads are persisted, remediations are not run");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
