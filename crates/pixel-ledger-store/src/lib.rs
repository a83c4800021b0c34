//! `RocksDB` storage layer for the pixel ledger.
//!
//! This crate owns every durable row of the ledger and the coordinator that
//! mutates them:
//!
//! - **PixelStore**: purchased cells, keyed by cell index. Never-purchased
//!   cells are simply absent.
//! - **WalletLedger**: account balances and the top-ups that funded them.
//! - **AuditLog**: append-only purchase records with per-account and per-cell
//!   indexes.
//! - [`Ledger`]: validates purchases and runs them as one atomic unit with
//!   conflict retries; serves window queries and idempotent credits.
//!
//! # Architecture
//!
//! The database is an optimistic-transaction `RocksDB` with these column
//! families:
//!
//! - `cells`: cell state, keyed by big-endian cell index
//! - `accounts`: wallet rows, keyed by `account_id`
//! - `top_ups`: applied top-ups, keyed by external payment reference
//! - `purchases`: purchase records, keyed by `purchase_id` (ULID)
//! - `purchases_by_account`: index for listing an account's purchases
//! - `purchases_by_cell`: index for listing a cell's purchase history
//!
//! # Example
//!
//! ```no_run
//! use pixel_ledger_core::{AccountId, GridConfig, PriceEngine, PurchaseRequest, TopUpSource};
//! use pixel_ledger_store::{Ledger, RetryPolicy, RocksStore};
//!
//! let store = RocksStore::open("/tmp/pixel-ledger-db").unwrap();
//! let ledger = Ledger::new(store, GridConfig::default(), PriceEngine::default(), RetryPolicy::default());
//!
//! let account_id = AccountId::generate();
//! ledger.credit(&account_id, 100, "pay_123", TopUpSource::Admin).unwrap();
//!
//! let receipt = ledger
//!     .purchase(&PurchaseRequest {
//!         account_id: Some(account_id),
//!         cell_index: 42,
//!         color: "#ff0000".into(),
//!         intensity: Some(10),
//!     })
//!     .unwrap();
//! assert_eq!(receipt.price_cents_charged, 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod ledger;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use ledger::{Ledger, RetryPolicy, Window};
pub use rocks::RocksStore;

use pixel_ledger_core::{
    Account, AccountId, Cell, CellIndex, PurchaseId, PurchaseRecord, TopUp, WindowRange,
};

/// Reads and writes staged inside one atomic unit.
///
/// A handle is only ever lent to the closure passed to
/// [`Store::atomically`]. Every `*_for_update` read registers the row, and
/// the unit fails to commit with [`StoreError::Conflict`] if another unit
/// committed a write to that row in the meantime. Nothing staged here is
/// visible to other readers until commit.
pub trait LedgerTxn {
    // =========================================================================
    // PixelStore
    // =========================================================================

    /// Read a cell and register it for conflict detection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn cell_for_update(&mut self, index: CellIndex) -> Result<Option<Cell>>;

    /// Stage a cell write.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_cell(&mut self, cell: &Cell) -> Result<()>;

    // =========================================================================
    // WalletLedger
    // =========================================================================

    /// Read an account and register it for conflict detection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn account_for_update(&mut self, account_id: &AccountId) -> Result<Option<Account>>;

    /// Stage an account write.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_account(&mut self, account: &Account) -> Result<()>;

    /// Read a top-up by reference and register it for conflict detection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn top_up_for_update(&mut self, reference: &str) -> Result<Option<TopUp>>;

    /// Stage a top-up write.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_top_up(&mut self, top_up: &TopUp) -> Result<()>;

    // =========================================================================
    // AuditLog
    // =========================================================================

    /// Stage a purchase record and its index entries. `account_seq` is the
    /// buyer's purchase count after this purchase and orders the account
    /// index.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn append_purchase(&mut self, record: &PurchaseRecord, account_seq: u64) -> Result<()>;
}

/// The storage trait defining all database operations.
///
/// Plain reads see committed state only. All mutation goes through
/// [`Store::atomically`].
pub trait Store: Send + Sync {
    // =========================================================================
    // Cells
    // =========================================================================

    /// Get a cell. `None` means it has never been purchased.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_cell(&self, index: CellIndex) -> Result<Option<Cell>>;

    /// All purchased cells inside `range`, in index order, read from a single
    /// consistent view of the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn cells_in_range(&self, range: &WindowRange) -> Result<Vec<Cell>>;

    // =========================================================================
    // Wallets
    // =========================================================================

    /// Get an account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>>;

    /// Get an applied top-up by its external reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_top_up(&self, reference: &str) -> Result<Option<TopUp>>;

    // =========================================================================
    // Audit log
    // =========================================================================

    /// Get a purchase record by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_purchase(&self, purchase_id: &PurchaseId) -> Result<Option<PurchaseRecord>>;

    /// List an account's purchases, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_purchases_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PurchaseRecord>>;

    /// List a cell's purchases, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_purchases_by_cell(
        &self,
        index: CellIndex,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PurchaseRecord>>;

    // =========================================================================
    // Atomic units
    // =========================================================================

    /// Run `unit` against a fresh transaction and commit it.
    ///
    /// If `unit` returns an error, nothing it staged is written. If the commit
    /// detects a conflicting write, the error is [`StoreError::Conflict`]
    /// (converted into `E`) and nothing is written either.
    ///
    /// # Errors
    ///
    /// Returns whatever `unit` returns, or a storage error from the commit.
    fn atomically<T, E, F>(&self, unit: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerTxn) -> std::result::Result<T, E>,
        E: From<StoreError>;
}
