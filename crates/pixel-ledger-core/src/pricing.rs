//! Cell pricing.
//!
//! A cell costs `base_price_cents * 2^n`, where `n` is the number of times it
//! has already been bought. Doubling overflows an `i64` long before a cell
//! could plausibly be bought 63 times, so each cell is capped at
//! [`MAX_PURCHASE_COUNT`] purchases.

use serde::{Deserialize, Serialize};

/// Default price of a never-purchased cell, in cents.
pub const DEFAULT_BASE_PRICE_CENTS: i64 = 1;

/// Number of purchases after which a cell can no longer be priced.
///
/// With the default base price the last purchasable step costs `2^29` cents.
pub const MAX_PURCHASE_COUNT: u32 = 30;

/// Maps a cell's pre-purchase count to its price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEngine {
    base_price_cents: i64,
}

impl Default for PriceEngine {
    fn default() -> Self {
        Self {
            base_price_cents: DEFAULT_BASE_PRICE_CENTS,
        }
    }
}

impl PriceEngine {
    /// Create an engine with a custom base price.
    ///
    /// Returns `None` unless `base_price_cents` is positive.
    #[must_use]
    pub const fn new(base_price_cents: i64) -> Option<Self> {
        if base_price_cents < 1 {
            return None;
        }
        Some(Self { base_price_cents })
    }

    /// Price of a virgin cell.
    #[must_use]
    pub const fn base_price_cents(&self) -> i64 {
        self.base_price_cents
    }

    /// Price of the next purchase of a cell that has been bought
    /// `purchase_count` times.
    ///
    /// Returns `None` once the cell has reached [`MAX_PURCHASE_COUNT`] or the
    /// price would not fit in an `i64`.
    #[must_use]
    pub const fn price(&self, purchase_count: u32) -> Option<i64> {
        if purchase_count >= MAX_PURCHASE_COUNT {
            return None;
        }
        self.base_price_cents.checked_mul(1_i64 << purchase_count)
    }
}
