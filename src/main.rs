//! freshet - Main entry point
//!
//! Polls a streaming-catalog API for new releases on behalf of an
//! external scheduler, serving normalized release candidates over HTTP
//! with cache-backed rate protection for the upstream service.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use freshet::config::FreshetConfig;
use freshet::services::catalog_client::CatalogClient;
use freshet::services::credentials::{CredentialSource, HttpCredentialManager};
use freshet::services::poll_engine::PollEngine;
use freshet::services::release_cache::ReleaseCache;
use freshet::{build_router, AppState};

/// Command-line arguments for freshet
#[derive(Parser, Debug)]
#[command(name = "freshet")]
#[command(about = "New-release polling cache for a streaming catalog")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "FRESHET_PORT")]
    port: Option<u16>,

    /// Path to the TOML config file
    #[arg(short, long, env = "FRESHET_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "freshet=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = FreshetConfig::load(args.config.as_deref()).context("Failed to load config")?;
    let port = args.port.unwrap_or(config.server.port);

    info!("Starting freshet on port {}", port);
    if config.upstream.base_url.is_empty() {
        warn!("No upstream base URL configured; poll cycles will fail until one is set");
    }

    let credentials: Arc<dyn CredentialSource> = Arc::new(
        HttpCredentialManager::new(
            config.upstream.token_url.clone(),
            config.auth.client_id.clone(),
            config.auth.refresh_token.clone(),
        )
        .context("Failed to initialize credential manager")?,
    );

    let client = Arc::new(
        CatalogClient::new(&config.upstream.base_url, Arc::clone(&credentials))
            .context("Failed to initialize catalog client")?,
    );

    let cache = Arc::new(ReleaseCache::new());
    let host = config.server.host.clone();
    let engine = Arc::new(PollEngine::new(
        Arc::new(config),
        client,
        Arc::clone(&cache),
        credentials,
    ));

    let app = build_router(AppState::new(engine, cache));

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid listen address")?;

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
