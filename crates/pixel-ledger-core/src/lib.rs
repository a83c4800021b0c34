//! Core types for the pixel ledger.
//!
//! This crate provides the foundational types shared by the store, the HTTP
//! service, and the client SDK:
//!
//! - **Identifiers**: `AccountId`, `PurchaseId`
//! - **Cells**: `Cell`, `CellIndex`, `CellView`, `Color`, `Intensity`, `WindowEntry`
//! - **Grid**: `GridConfig`, `WindowRange`
//! - **Pricing**: `PriceEngine`
//! - **Wallets**: `Account`, `TopUp`
//! - **Purchases**: `PurchaseRequest`, `PurchaseReceipt`, `PurchaseRecord`
//!
//! # Money
//!
//! All amounts are `i64` integer cents. A virgin cell costs the base price
//! (1 cent by default) and every purchase doubles the price of the next one.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod cell;
pub mod error;
pub mod grid;
pub mod ids;
pub mod pricing;
pub mod purchase;

pub use account::Account;
pub use cell::{Cell, CellIndex, CellView, Color, Intensity, WindowEntry, MAX_INTENSITY};
pub use error::{LedgerError, Result};
pub use grid::{
    GridConfig, WindowRange, DEFAULT_GRID_HEIGHT, DEFAULT_GRID_WIDTH, DEFAULT_MAX_WINDOW,
};
pub use ids::{AccountId, IdError, PurchaseId};
pub use pricing::{PriceEngine, DEFAULT_BASE_PRICE_CENTS, MAX_PURCHASE_COUNT};
pub use purchase::{
    CreditReceipt, PurchaseReceipt, PurchaseRecord, PurchaseRequest, TopUp, TopUpSource,
    ValidatedPurchase,
};
