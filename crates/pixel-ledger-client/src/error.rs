//! Client error types.

use pixel_ledger_core::{CellIndex, LedgerError};

/// Errors that can occur when using the pixel ledger client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// Missing or rejected session token.
    #[error("authentication required")]
    Unauthorized,

    /// The wallet cannot cover the purchase.
    #[error("insufficient funds: balance={balance}, required={required}")]
    InsufficientFunds {
        /// Current balance in cents.
        balance: i64,
        /// Price in cents.
        required: i64,
    },

    /// The cell can no longer be bought.
    #[error("cell {index} has reached its purchase limit ({purchase_count})")]
    PriceCapReached {
        /// The capped cell.
        index: CellIndex,
        /// Its purchase count.
        purchase_count: u32,
    },

    /// The service gave up under contention; the request may be retried.
    #[error("service busy: {0}")]
    Busy(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A request was rejected before it was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] LedgerError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}
