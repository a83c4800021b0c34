//! Purchase requests, receipts, and the records they leave behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cell::{CellIndex, Color, Intensity};
use crate::error::{LedgerError, Result};
use crate::grid::GridConfig;
use crate::{AccountId, PurchaseId};

/// A purchase as it arrives from the caller, before any checks.
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    /// Authenticated caller; `None` when no identity was supplied.
    pub account_id: Option<AccountId>,
    /// Requested cell, unchecked.
    pub cell_index: i64,
    /// Requested color, unchecked.
    pub color: String,
    /// Requested intensity, unchecked. Omitted means 0.
    pub intensity: Option<i64>,
}

impl PurchaseRequest {
    /// Check identity and input shape against the grid.
    ///
    /// # Errors
    ///
    /// - `LedgerError::AuthRequired` if no account is attached.
    /// - `LedgerError::InvalidInput` for an out-of-range index, a color that is
    ///   not `#rrggbb`, or an intensity outside `[0, 30]`.
    pub fn validate(&self, grid: &GridConfig) -> Result<ValidatedPurchase> {
        let account_id = self.account_id.ok_or(LedgerError::AuthRequired)?;
        let cell = grid.cell(self.cell_index)?;
        let color = self.color.parse()?;
        let intensity = self
            .intensity
            .map(Intensity::new)
            .transpose()?
            .unwrap_or_default();

        Ok(ValidatedPurchase {
            account_id,
            cell,
            color,
            intensity,
        })
    }
}

/// A purchase whose inputs are well-formed. Price and balance are not yet
/// known; those are only read inside the atomic unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedPurchase {
    /// The paying account.
    pub account_id: AccountId,
    /// The cell being bought.
    pub cell: CellIndex,
    /// Color to paint.
    pub color: Color,
    /// Intensity to set.
    pub intensity: Intensity,
}

/// What a committed purchase reports back to the caller.
///
/// Clients apply this directly to their local view instead of re-fetching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    /// Audit record ID.
    pub purchase_id: PurchaseId,
    /// The cell bought.
    pub cell_index: CellIndex,
    /// Color now shown.
    pub color: Color,
    /// Intensity now shown.
    pub intensity: Intensity,
    /// Price taken from the wallet.
    pub price_cents_charged: i64,
    /// Cell purchase count including this purchase.
    pub purchase_count_after: u32,
    /// Wallet balance after the debit.
    pub balance_after_cents: i64,
}

/// Append-only audit entry for one committed purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    /// Unique, time-ordered ID.
    pub id: PurchaseId,
    /// The paying account.
    pub account_id: AccountId,
    /// The cell bought.
    pub cell_index: CellIndex,
    /// Color painted.
    pub color: Color,
    /// Intensity set.
    pub intensity: Intensity,
    /// Price charged in cents.
    pub price_charged_cents: i64,
    /// Cell purchase count including this purchase.
    pub purchase_count_after: u32,
    /// Wallet balance after the debit.
    pub balance_after_cents: i64,
    /// When the purchase committed.
    pub timestamp: DateTime<Utc>,
}

impl PurchaseRecord {
    /// The caller-facing receipt for this record.
    #[must_use]
    pub const fn receipt(&self) -> PurchaseReceipt {
        PurchaseReceipt {
            purchase_id: self.id,
            cell_index: self.cell_index,
            color: self.color,
            intensity: self.intensity,
            price_cents_charged: self.price_charged_cents,
            purchase_count_after: self.purchase_count_after,
            balance_after_cents: self.balance_after_cents,
        }
    }
}

/// Where a top-up came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopUpSource {
    /// Completed Stripe checkout session.
    Stripe,
    /// Manual credit by an operator.
    Admin,
}

/// A wallet top-up, stored once per external payment reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUp {
    /// External payment reference; the idempotency key.
    pub reference: String,
    /// Credited account.
    pub account_id: AccountId,
    /// Amount added in cents.
    pub amount_cents: i64,
    /// Balance right after this top-up.
    pub balance_after_cents: i64,
    /// Origin of the funds.
    pub source: TopUpSource,
    /// When the top-up committed.
    pub created_at: DateTime<Utc>,
}

/// Outcome of a credit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditReceipt {
    /// The stored top-up (the original one on replays).
    pub top_up: TopUp,
    /// `true` when the reference had already been applied and nothing changed.
    pub already_applied: bool,
}
