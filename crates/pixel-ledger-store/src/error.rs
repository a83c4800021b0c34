//! Error types for pixel ledger storage.

use pixel_ledger_core::LedgerError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A row read for update inside an atomic unit was written by another
    /// committed unit. The whole unit must be retried from fresh reads.
    #[error("write conflict")]
    Conflict,

    /// An index entry pointed at a missing record.
    #[error("dangling index entry: {0}")]
    Dangling(String),
}

impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        match err.kind() {
            rocksdb::ErrorKind::Busy | rocksdb::ErrorKind::TryAgain => Self::Conflict,
            _ => Self::Database(err.to_string()),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => Self::TransientConflict,
            StoreError::Serialization(msg) => Self::Serialization(msg),
            StoreError::Database(msg) | StoreError::Dangling(msg) => Self::Storage(msg),
        }
    }
}
