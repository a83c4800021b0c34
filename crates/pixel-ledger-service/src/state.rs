//! Application state.

use std::sync::Arc;

use pixel_ledger_core::LedgerError;
use pixel_ledger_store::{Ledger, RocksStore};

use crate::config::ServiceConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The purchase coordinator and its store.
    pub ledger: Arc<Ledger<RocksStore>>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state over an opened store.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidInput` if the grid or pricing settings
    /// are invalid.
    pub fn new(store: RocksStore, config: ServiceConfig) -> Result<Self, LedgerError> {
        let grid = config.grid()?;
        let pricing = config.pricing()?;
        let retry = config.retry_policy();

        if config.auth_jwt_secret.is_none() {
            tracing::warn!("AUTH_JWT_SECRET not configured - purchases and wallet reads will be refused");
        }
        if config.admin_api_key.is_none() {
            tracing::warn!("ADMIN_API_KEY not configured - manual credits are disabled");
        }

        tracing::info!(
            width = grid.width,
            height = grid.height,
            max_window = grid.max_window,
            base_price_cents = pricing.base_price_cents(),
            max_attempts = retry.max_attempts,
            "Ledger configured"
        );

        Ok(Self {
            ledger: Arc::new(Ledger::new(store, grid, pricing, retry)),
            config,
        })
    }
}
