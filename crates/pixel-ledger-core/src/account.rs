//! Wallet accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::AccountId;

/// A wallet holding the balance a user spends on cells.
///
/// Balances are integer cents and never go negative. An account row is
/// created by its first top-up; until then the wallet reads as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// The account ID (from the authentication collaborator).
    pub account_id: AccountId,

    /// Spendable balance in cents.
    pub balance_cents: i64,

    /// Lifetime top-ups (in cents).
    pub lifetime_credited_cents: i64,

    /// Lifetime spend on cells (in cents).
    pub lifetime_spent_cents: i64,

    /// Number of cells bought.
    pub purchase_count: u64,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with zero balance.
    #[must_use]
    pub fn new(account_id: AccountId) -> Self {
        let now = Utc::now();
        Self {
            account_id,
            balance_cents: 0,
            lifetime_credited_cents: 0,
            lifetime_spent_cents: 0,
            purchase_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the account can cover `amount_cents`.
    #[must_use]
    pub fn has_sufficient_funds(&self, amount_cents: i64) -> bool {
        self.balance_cents >= amount_cents
    }

    /// Add funds from a top-up. Returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidAmount` for non-positive amounts or if the
    /// balance would overflow.
    pub fn credit(&mut self, amount_cents: i64) -> Result<i64> {
        if amount_cents <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "credit must be positive, got {amount_cents}"
            )));
        }
        let balance = self
            .balance_cents
            .checked_add(amount_cents)
            .ok_or_else(|| LedgerError::InvalidAmount("balance overflow".into()))?;

        self.balance_cents = balance;
        self.lifetime_credited_cents = self.lifetime_credited_cents.saturating_add(amount_cents);
        self.updated_at = Utc::now();
        Ok(balance)
    }

    /// Take the price of one cell purchase. Returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InsufficientFunds` if the balance would go
    /// negative; the account is left untouched.
    pub fn debit(&mut self, amount_cents: i64) -> Result<i64> {
        if amount_cents <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "debit must be positive, got {amount_cents}"
            )));
        }
        if !self.has_sufficient_funds(amount_cents) {
            return Err(LedgerError::InsufficientFunds {
                balance: self.balance_cents,
                required: amount_cents,
            });
        }

        self.balance_cents -= amount_cents;
        self.lifetime_spent_cents = self.lifetime_spent_cents.saturating_add(amount_cents);
        self.purchase_count += 1;
        self.updated_at = Utc::now();
        Ok(self.balance_cents)
    }
}
