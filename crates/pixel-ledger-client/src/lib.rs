//! Pixel Ledger Client SDK.
//!
//! This crate provides a client library for frontends and tools talking to
//! the pixel ledger API, plus a [`SparseView`] that keeps a local copy of the
//! purchased cells current without re-fetching after each purchase.
//!
//! # Example
//!
//! ```no_run
//! use pixel_ledger_client::{LedgerClient, SparseView};
//! use pixel_ledger_core::CellIndex;
//!
//! # async fn example() -> Result<(), pixel_ledger_client::ClientError> {
//! let client = LedgerClient::new("http://pixel-ledger:8080")?.with_token("session-jwt");
//!
//! let grid = client.grid().await?;
//! let mut view = SparseView::from_grid_info(&grid)?;
//! let range = view.grid().window(0, 1000)?;
//! let window = client.window(range.start().get(), range.end().get()).await?;
//! view.apply_window(&range, &window);
//!
//! let cell = CellIndex::new(42);
//! println!("Next price: {:?} cents", view.next_price(cell));
//!
//! let receipt = client.buy(cell, "#ff0000".parse().expect("color"), None).await?;
//! view.apply_receipt(&receipt);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;
mod view;

pub use client::{ClientOptions, LedgerClient};
pub use error::ClientError;
pub use types::*;
pub use view::SparseView;
