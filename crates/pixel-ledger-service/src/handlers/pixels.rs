//! Grid, window and purchase handlers.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use pixel_ledger_core::{CellView, PurchaseReceipt, PurchaseRecord, PurchaseRequest, MAX_PURCHASE_COUNT};
use pixel_ledger_store::Window;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Grid description for clients sizing their views.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridResponse {
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

/// Get the grid geometry and pricing constants.
pub async fn get_grid(State(state): State<Arc<AppState>>) -> Json<GridResponse> {
    let grid = state.ledger.grid();

    Json(GridResponse {
        width: grid.width,
        height: grid.height,
        cell_count: grid.cell_count(),
        max_window: grid.max_window,
        base_price_cents: state.ledger.pricing().base_price_cents(),
        max_purchase_count: MAX_PURCHASE_COUNT,
    })
}

/// Window query parameters.
#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    /// First index (inclusive).
    pub start: i64,
    /// Last index (exclusive).
    pub end: i64,
}

/// Get all purchased cells in `[start, end)`.
///
/// Response: `{"42": ["#ff0000", 10, 2], ...}`.
///
/// Store reads run on the blocking pool like writes do.
pub async fn get_window(
    State(state): State<Arc<AppState>>,
    query: Result<Query<WindowQuery>, QueryRejection>,
) -> Result<Json<Window>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::InvalidRange(e.body_text()))?;

    let ledger = Arc::clone(&state.ledger);
    let window =
        tokio::task::spawn_blocking(move || ledger.window(query.start, query.end)).await??;
    Ok(Json(window))
}

/// Get one cell with the price of its next purchase.
pub async fn get_cell(
    State(state): State<Arc<AppState>>,
    index: Result<Path<i64>, PathRejection>,
) -> Result<Json<CellView>, ApiError> {
    let Path(index) = index.map_err(|e| ApiError::InvalidInput(e.body_text()))?;

    let ledger = Arc::clone(&state.ledger);
    let cell = tokio::task::spawn_blocking(move || ledger.cell(index)).await??;
    Ok(Json(cell))
}

/// Pagination parameters for history listings.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// Page size (default 50, at most 100).
    pub limit: Option<usize>,
    /// Entries to skip (at most 10 000).
    #[serde(default)]
    pub offset: usize,
}

/// A cell's purchase history.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellHistoryResponse {
    /// The cell.
    pub cell_index: i64,
    /// Purchases, newest first.
    pub purchases: Vec<PurchaseRecord>,
}

/// List a cell's purchases, newest first.
pub async fn get_cell_history(
    State(state): State<Arc<AppState>>,
    index: Result<Path<i64>, PathRejection>,
    page: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<CellHistoryResponse>, ApiError> {
    let Path(index) = index.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    let Query(page) = page.map_err(|e| ApiError::InvalidInput(e.body_text()))?;

    let ledger = Arc::clone(&state.ledger);
    let purchases = tokio::task::spawn_blocking(move || {
        ledger.purchases_by_cell(index, page.limit, page.offset)
    })
    .await??;

    Ok(Json(CellHistoryResponse {
        cell_index: index,
        purchases,
    }))
}

/// Purchase request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyRequest {
    /// Cell to buy.
    pub cell_index: i64,
    /// `#rrggbb`.
    pub color: String,
    /// 0..=30, default 0.
    #[serde(default)]
    pub intensity: Option<i64>,
}

/// Buy a cell.
///
/// The purchase runs on the blocking pool: it holds a storage transaction and
/// may back off between conflicting attempts.
pub async fn buy(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    body: Result<Json<BuyRequest>, JsonRejection>,
) -> Result<Json<PurchaseReceipt>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::InvalidInput(e.body_text()))?;

    let request = PurchaseRequest {
        account_id: Some(auth.account_id),
        cell_index: body.cell_index,
        color: body.color,
        intensity: body.intensity,
    };

    let ledger = Arc::clone(&state.ledger);
    let receipt = tokio::task::spawn_blocking(move || ledger.purchase(&request)).await??;

    Ok(Json(receipt))
}
