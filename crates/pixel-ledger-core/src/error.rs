//! Error types for the pixel ledger.

use crate::cell::CellIndex;
use crate::ids::IdError;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur in ledger operations.
///
/// Everything except [`LedgerError::TransientConflict`] is terminal and is
/// reported to the caller as-is. Conflicts are retried by the purchase
/// coordinator and only ever escape as [`LedgerError::RetriesExhausted`].
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Malformed cell index, color, or intensity.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The caller identity is missing.
    #[error("authentication required")]
    AuthRequired,

    /// The wallet cannot cover the price at commit time.
    #[error("insufficient funds: balance={balance}, required={required}")]
    InsufficientFunds {
        /// Current balance in cents.
        balance: i64,
        /// Price of the purchase in cents.
        required: i64,
    },

    /// Window request too large or malformed.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// The cell has been bought the maximum number of times.
    #[error("cell {index} cannot be priced after {purchase_count} purchases")]
    PriceCapReached {
        /// The cell that hit the cap.
        index: CellIndex,
        /// Its current purchase count.
        purchase_count: u32,
    },

    /// A credit amount was zero, negative, or overflowed the balance.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Storage-level contention on a cell or account row.
    #[error("transient storage conflict")]
    TransientConflict,

    /// Conflicts persisted for every allowed attempt.
    #[error("gave up after {attempts} conflicting attempts")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

impl LedgerError {
    /// Whether the operation may be attempted again without caller changes.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientConflict)
    }
}
