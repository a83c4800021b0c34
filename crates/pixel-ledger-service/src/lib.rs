//! Pixel Ledger HTTP API Service.
//!
//! This crate exposes the ledger over HTTP:
//!
//! - Window reads of the sparse grid
//! - Cell purchases with atomic debit and audit
//! - Wallet balance, history and idempotent credits
//! - Stripe checkout webhooks
//!
//! # Authentication
//!
//! 1. **Session JWTs** (HS256, `sub` = account ID) for buyers
//! 2. **Admin API key** (`X-Admin-Key`) for manual credits

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers are async for axum

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
