//! Service configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use pixel_ledger_core::{
    GridConfig, LedgerError, PriceEngine, DEFAULT_BASE_PRICE_CENTS, DEFAULT_GRID_HEIGHT,
    DEFAULT_GRID_WIDTH, DEFAULT_MAX_WINDOW,
};
use pixel_ledger_store::ledger::DEFAULT_MAX_ATTEMPTS;
use pixel_ledger_store::RetryPolicy;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/pixel-ledger").
    pub data_dir: String,

    /// Grid columns (default: 1000).
    pub grid_width: u32,

    /// Grid rows (default: 1000).
    pub grid_height: u32,

    /// Largest window a single read may span (default: 20000).
    pub max_window: u32,

    /// Price of a virgin cell in cents (default: 1).
    pub base_price_cents: i64,

    /// Attempts per purchase or credit under write contention (default: 16).
    pub purchase_max_attempts: u32,

    /// HS256 secret shared with the session issuer. Bearer auth is refused
    /// when unset.
    pub auth_jwt_secret: Option<String>,

    /// Expected `iss` claim, if any.
    pub auth_issuer: Option<String>,

    /// Key for `X-Admin-Key` authenticated endpoints.
    pub admin_api_key: Option<String>,

    /// Stripe webhook signing secret (optional).
    pub stripe_webhook_secret: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    #[serde(default)]
    webhook_secret: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            grid_width: env_parse("GRID_WIDTH").unwrap_or(defaults.grid_width),
            grid_height: env_parse("GRID_HEIGHT").unwrap_or(defaults.grid_height),
            max_window: env_parse("MAX_WINDOW").unwrap_or(defaults.max_window),
            base_price_cents: env_parse("BASE_PRICE_CENTS").unwrap_or(defaults.base_price_cents),
            purchase_max_attempts: env_parse("PURCHASE_MAX_ATTEMPTS")
                .unwrap_or(defaults.purchase_max_attempts),
            auth_jwt_secret: std::env::var("AUTH_JWT_SECRET").ok(),
            auth_issuer: std::env::var("AUTH_ISSUER").ok(),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            stripe_webhook_secret: load_stripe_webhook_secret(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
        }
    }

    /// Grid geometry.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidInput` for an empty or oversized grid or a
    /// zero window cap.
    pub fn grid(&self) -> Result<GridConfig, LedgerError> {
        GridConfig::new(self.grid_width, self.grid_height, self.max_window)
    }

    /// Pricing rule.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidInput` unless the base price is positive.
    pub fn pricing(&self) -> Result<PriceEngine, LedgerError> {
        PriceEngine::new(self.base_price_cents).ok_or_else(|| {
            LedgerError::InvalidInput(format!(
                "BASE_PRICE_CENTS must be at least 1, got {}",
                self.base_price_cents
            ))
        })
    }

    /// Conflict retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_attempts(self.purchase_max_attempts)
    }

    /// Request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Parse an environment variable, ignoring unset or malformed values.
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(name, value = %raw, "Ignoring malformed configuration value");
            None
        }
    }
}

/// Load the Stripe webhook secret from file or environment.
fn load_stripe_webhook_secret() -> Option<String> {
    let secret_paths = [
        ".secrets/stripe.json",
        "pixel-ledger/.secrets/stripe.json",
        "../.secrets/stripe.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(path) {
            tracing::info!(path = %path, "Loaded Stripe secrets from file");
            if secrets.webhook_secret.is_some() {
                return secrets.webhook_secret;
            }
        }
    }

    tracing::debug!("Stripe secrets file not found, using environment variables");
    std::env::var("STRIPE_WEBHOOK_SECRET").ok()
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/pixel-ledger".into(),
            grid_width: DEFAULT_GRID_WIDTH,
            grid_height: DEFAULT_GRID_HEIGHT,
            max_window: DEFAULT_MAX_WINDOW,
            base_price_cents: DEFAULT_BASE_PRICE_CENTS,
            purchase_max_attempts: DEFAULT_MAX_ATTEMPTS,
            auth_jwt_secret: None,
            auth_issuer: None,
            admin_api_key: None,
            stripe_webhook_secret: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 64 * 1024,
            request_timeout_seconds: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_full_grid() {
        let config = ServiceConfig::default();
        let grid = config.grid().unwrap();
        assert_eq!(grid.cell_count(), 1_000_000);
        assert_eq!(grid.max_window, 20_000);
        assert_eq!(config.pricing().unwrap().base_price_cents(), 1);
        assert_eq!(config.retry_policy().max_attempts, 16);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn invalid_settings_are_reported() {
        let config = ServiceConfig {
            grid_width: 0,
            base_price_cents: 0,
            ..ServiceConfig::default()
        };
        assert!(config.grid().is_err());
        assert!(config.pricing().is_err());
    }
}
