//! Column families of the `RocksDB` database.

/// Column family names.
pub mod cf {
    /// Purchased cells, keyed by big-endian `u32` cell index.
    pub const CELLS: &str = "cells";

    /// Wallet accounts, keyed by `account_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Applied top-ups, keyed by external payment reference.
    pub const TOP_UPS: &str = "top_ups";

    /// Purchase records, keyed by `purchase_id` (ULID).
    pub const PURCHASES: &str = "purchases";

    /// Index: purchases by account, keyed by `account_id || purchase_id`.
    /// Value is empty (index only).
    pub const PURCHASES_BY_ACCOUNT: &str = "purchases_by_account";

    /// Index: purchases by cell, keyed by `cell_index || purchase_count_after`.
    /// Value is the `purchase_id`.
    pub const PURCHASES_BY_CELL: &str = "purchases_by_cell";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::CELLS,
        cf::ACCOUNTS,
        cf::TOP_UPS,
        cf::PURCHASES,
        cf::PURCHASES_BY_ACCOUNT,
        cf::PURCHASES_BY_CELL,
    ]
}
