//! Pixel Ledger Service - HTTP API for the pixel marketplace ledger
//!
//! This is the main entry point for the pixel-ledger service.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pixel_ledger_service::{create_router, AppState, ServiceConfig};
use pixel_ledger_store::RocksStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pixel_ledger=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Pixel Ledger Service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        auth_configured = %config.auth_jwt_secret.is_some(),
        admin_configured = %config.admin_api_key.is_some(),
        stripe_configured = %config.stripe_webhook_secret.is_some(),
        "Service configuration loaded"
    );

    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let store = RocksStore::open(&config.data_dir)?;

    let state = AppState::new(store, config.clone())?;

    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
