//! Key encoding utilities for `RocksDB`.
//!
//! All integer components are big-endian so that byte order matches numeric
//! order and prefix/range scans come back sorted.

use pixel_ledger_core::{AccountId, CellIndex, PurchaseId};

/// Create a cell key from a cell index.
#[must_use]
pub fn cell_key(index: CellIndex) -> [u8; 4] {
    index.to_be_bytes()
}

/// Decode a cell key.
///
/// Returns `None` if the key is not exactly 4 bytes.
#[must_use]
pub fn decode_cell_key(key: &[u8]) -> Option<CellIndex> {
    let bytes: [u8; 4] = key.try_into().ok()?;
    Some(CellIndex::from_be_bytes(bytes))
}

/// Create an account key from an account ID.
#[must_use]
pub fn account_key(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Create a top-up key from an external payment reference.
#[must_use]
pub fn top_up_key(reference: &str) -> Vec<u8> {
    reference.as_bytes().to_vec()
}

/// Create a purchase key from a purchase ID.
#[must_use]
pub fn purchase_key(purchase_id: &PurchaseId) -> Vec<u8> {
    purchase_id.to_bytes().to_vec()
}

/// Create an account-purchase index key.
///
/// Format: `account_id (16 bytes) || purchase_seq (8 bytes)`, where
/// `purchase_seq` is the account's purchase count after the purchase. It is
/// assigned while the account row is held for update, so it is unique per
/// account and entries are ordered by purchase sequence.
#[must_use]
pub fn account_purchase_key(account_id: &AccountId, purchase_seq: u64) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[..16].copy_from_slice(account_id.as_bytes());
    key[16..].copy_from_slice(&purchase_seq.to_be_bytes());
    key
}

/// Prefix for iterating all purchases of an account.
#[must_use]
pub fn account_purchases_prefix(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Create a cell-purchase index key.
///
/// Format: `cell_index (4 bytes) || purchase_count_after (4 bytes)`. The
/// count is unique per cell, so entries are ordered by purchase sequence.
#[must_use]
pub fn cell_purchase_key(index: CellIndex, purchase_count_after: u32) -> [u8; 8] {
    let mut key = [0u8; 8];
    key[..4].copy_from_slice(&index.to_be_bytes());
    key[4..].copy_from_slice(&purchase_count_after.to_be_bytes());
    key
}

/// Prefix for iterating all purchases of a cell.
#[must_use]
pub fn cell_purchases_prefix(index: CellIndex) -> [u8; 4] {
    index.to_be_bytes()
}

/// Decode a purchase ID stored as an index value.
#[must_use]
pub fn decode_purchase_id(value: &[u8]) -> Option<PurchaseId> {
    let bytes: [u8; 16] = value.try_into().ok()?;
    Some(PurchaseId::from_bytes(bytes))
}
