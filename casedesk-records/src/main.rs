//! casedesk-records - record service entry point

use std::path::PathBuf;

use anyhow::{Context, Result};
use casedesk_common::config::{CliOverrides, ConfigResolver, RootFolderInitializer};
use casedesk_common::db::init_database;
use casedesk_records::{build_router, AppState};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for casedesk-records
#[derive(Parser, Debug)]
#[command(name = "casedesk-records")]
#[command(about = "Collections case-management record service")]
#[command(version)]
struct Args {
    /// Folder holding the database file
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:5740
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Config file to read instead of the default locations
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ConfigResolver::new(CliOverrides {
        root_folder: args.root_folder,
        bind_address: args.bind,
        log_level: args.log_level,
        config_file: args.config,
    })
    .resolve();

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str())),
        )
        .init();

    info!(
        "Starting casedesk-records v{} (root folder {})",
        env!("CARGO_PKG_VERSION"),
        config.root_folder.display()
    );

    let initializer = RootFolderInitializer::new(config.root_folder.clone());
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let app = build_router(AppState::new(pool));

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;
    info!("casedesk-records listening on http://{}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
