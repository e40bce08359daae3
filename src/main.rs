use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pitchrocket::config::Config;
use pitchrocket::generation::OpenAiGenerator;
use pitchrocket::payments::StripeGateway;
use pitchrocket::AppState;

#[derive(Parser, Debug)]
#[command(name = "pitchrocket")]
#[command(author, version, about = "Credit-metered AI pitch generation service", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "pitchrocket.toml")]
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

    tracing::info!("Starting PitchRocket v{}", env!("CARGO_PKG_VERSION"));

    // Ensure data directory exists
    std::fs::create_dir_all(&config.server.data_dir)?;

    // Initialize database
    let db = pitchrocket::db::init(&config.server.data_dir).await?;

    // Ensure default admin user exists
    pitchrocket::api::auth::ensure_admin_user(
        &db,
        &config.auth.admin_email,
        &config.auth.admin_password,
    )
    .await?;

    if config.generation.api_key.is_none() {
        tracing::warn!("No generation api_key configured; pitch generation will fail");
    }
    if config.payments.secret_key.is_none() {
        tracing::warn!("No payment secret_key configured; checkout will fail");
    }

    // External collaborators
    let generator = Arc::new(OpenAiGenerator::new(&config.generation));
    let payments = Arc::new(StripeGateway::new(&config.payments));

    // Create app state and router
    let state = Arc::new(AppState::new(config.clone(), db, generator, payments));
    let app = pitchrocket::api::create_router(state);

    // Start API server
    let api_addr = format!("{}:{}", config.server.host, config.server.api_port);
    let listener = tokio::net::TcpListener::bind(&api_addr).await?;

    tracing::info!("API server listening on http://{}", api_addr);

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
