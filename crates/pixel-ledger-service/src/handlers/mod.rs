//! API handlers.

pub mod health;
pub mod pixels;
pub mod wallet;
pub mod webhooks;
