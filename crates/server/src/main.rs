//! vitrine server entry point.
//!
//! Boots the product catalog API over HTTP. Logging goes to stderr as JSON.

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use vitrine_client::DriveCatalog;
use vitrine_core::{AppConfig, CacheStore, RefreshCoordinator};

mod cors;
mod error;
mod response;
mod routes;

use cors::CorsPolicy;
use routes::{AppState, create_router};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let policy = config.cache_policy()?;
    let catalog = DriveCatalog::from_config(&config)?;
    let coordinator = RefreshCoordinator::new(CacheStore::new(), Arc::new(catalog), policy);

    let app = create_router(AppState::new(coordinator.clone(), CorsPolicy::from_config(&config)));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(
        addr = %config.bind_addr,
        ttl_secs = policy.ttl().as_secs(),
        refresh_threshold_secs = policy.refresh_threshold().as_secs(),
        allowed_origins = config.allowed_origins.len(),
        "Starting vitrine server"
    );

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    coordinator.shutdown();
    Ok(())
}
