//! Wallet handlers.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use pixel_ledger_core::{Account, AccountId, PurchaseRecord, TopUpSource};

use crate::auth::{AdminAuth, AuthUser};
use crate::error::ApiError;
use crate::handlers::pixels::PageQuery;
use crate::state::AppState;

/// Wallet response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    /// Account ID.
    pub account_id: String,
    /// Current balance in cents.
    pub balance_cents: i64,
    /// Lifetime top-ups in cents.
    pub lifetime_credited_cents: i64,
    /// Lifetime spend in cents.
    pub lifetime_spent_cents: i64,
    /// Cells bought.
    pub purchase_count: u64,
}

impl From<&Account> for WalletResponse {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.account_id.to_string(),
            balance_cents: account.balance_cents,
            lifetime_credited_cents: account.lifetime_credited_cents,
            lifetime_spent_cents: account.lifetime_spent_cents,
            purchase_count: account.purchase_count,
        }
    }
}

/// Get the caller's wallet.
pub async fn get_wallet(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<WalletResponse>, ApiError> {
    let ledger = Arc::clone(&state.ledger);
    let account =
        tokio::task::spawn_blocking(move || ledger.account(&auth.account_id)).await??;
    Ok(Json(WalletResponse::from(&account)))
}

/// The caller's purchases.
#[derive(Debug, Serialize)]
pub struct PurchasesResponse {
    /// Purchases, newest first.
    pub purchases: Vec<PurchaseRecord>,
}

/// List the caller's purchases, newest first.
pub async fn list_purchases(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    page: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<PurchasesResponse>, ApiError> {
    let Query(page) = page.map_err(|e| ApiError::InvalidInput(e.body_text()))?;

    let ledger = Arc::clone(&state.ledger);
    let purchases = tokio::task::spawn_blocking(move || {
        ledger.purchases_by_account(&auth.account_id, page.limit, page.offset)
    })
    .await??;

    Ok(Json(PurchasesResponse { purchases }))
}

/// Manual credit request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditRequest {
    /// Wallet to credit.
    pub account_id: AccountId,
    /// Amount in cents.
    pub amount_cents: i64,
    /// External reference; a replay with the same reference is a no-op.
    pub reference: String,
}

/// Credit response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditResponse {
    /// Credited wallet.
    pub account_id: String,
    /// Amount of the stored top-up.
    pub amount_cents: i64,
    /// Balance right after the stored top-up.
    pub balance_after_cents: i64,
    /// The reference.
    pub reference: String,
    /// `true` when this reference was already applied.
    pub already_applied: bool,
}

/// Credit a wallet (admin only).
pub async fn credit(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    body: Result<Json<CreditRequest>, JsonRejection>,
) -> Result<Json<CreditResponse>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::InvalidInput(e.body_text()))?;

    tracing::info!(
        admin_id = %admin.admin_id,
        account_id = %body.account_id,
        amount_cents = body.amount_cents,
        reference = %body.reference,
        "Admin credit requested"
    );

    let ledger = Arc::clone(&state.ledger);
    let receipt = tokio::task::spawn_blocking(move || {
        ledger.credit(
            &body.account_id,
            body.amount_cents,
            &body.reference,
            TopUpSource::Admin,
        )
    })
    .await??;

    Ok(Json(CreditResponse {
        account_id: receipt.top_up.account_id.to_string(),
        amount_cents: receipt.top_up.amount_cents,
        balance_after_cents: receipt.top_up.balance_after_cents,
        reference: receipt.top_up.reference,
        already_applied: receipt.already_applied,
    }))
}
