//! Request and response types for the pixel ledger client.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use pixel_ledger_core::{AccountId, CellIndex, PurchaseRecord, WindowEntry};

/// Purchased cells of a window, keyed by index.
pub type Window = BTreeMap<CellIndex, WindowEntry>;

/// Health check response.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
}

/// Grid geometry and pricing constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridInfo {
    /// Columns.
    pub width: u32,
    /// Rows.
    pub height: u32,
    /// Total cells.
    pub cell_count: u32,
    /// Largest window a read may span.
    pub max_window: u32,
    /// Price of a virgin cell.
    pub base_price_cents: i64,
    /// Purchases after which a cell is capped.
    pub max_purchase_count: u32,
}

/// Purchase request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyRequest {
    /// Cell to buy.
    pub cell_index: u32,
    /// `#rrggbb`.
    pub color: String,
    /// 0..=30; the service defaults it to 0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<u8>,
}

/// A wallet as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    /// Account ID.
    pub account_id: AccountId,
    /// Current balance in cents.
    pub balance_cents: i64,
    /// Lifetime top-ups in cents.
    pub lifetime_credited_cents: i64,
    /// Lifetime spend in cents.
    pub lifetime_spent_cents: i64,
    /// Cells bought.
    pub purchase_count: u64,
}

/// A cell's purchase history.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellHistory {
    /// The cell.
    pub cell_index: u32,
    /// Purchases, newest first.
    pub purchases: Vec<PurchaseRecord>,
}

/// The caller's purchases.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseList {
    /// Purchases, newest first.
    pub purchases: Vec<PurchaseRecord>,
}

/// Pagination for history listings.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Page {
    /// Page size; the service defaults to 50 and caps at 100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Entries to skip.
    pub offset: usize,
}

/// API error response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Additional details.
    pub details: Option<serde_json::Value>,
}
