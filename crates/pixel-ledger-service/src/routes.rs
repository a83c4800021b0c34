//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::handlers::{health, pixels, wallet, webhooks};
use crate::state::AppState;

/// Maximum concurrent requests for the pixel and wallet endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 256;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /grid` - Grid geometry and pricing constants
/// - `GET /pixels/get?start=&end=` - Purchased cells in a window
/// - `GET /pixels/cell/:index` - One cell and its next price
/// - `GET /pixels/cell/:index/history` - A cell's purchases
///
/// ## Session JWT auth
/// - `POST /pixels/buy` - Buy a cell
/// - `GET /wallet` - Current wallet
/// - `GET /wallet/purchases` - Caller's purchases
///
/// ## Admin key auth
/// - `POST /wallet/credit` - Idempotent manual credit
///
/// ## Signature verification
/// - `POST /webhooks/stripe` - Stripe webhooks
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let state = Arc::new(state);

    let api_routes = Router::new()
        .route("/grid", get(pixels::get_grid))
        .route("/pixels/get", get(pixels::get_window))
        .route("/pixels/cell/:index", get(pixels::get_cell))
        .route("/pixels/cell/:index/history", get(pixels::get_cell_history))
        .route("/pixels/buy", post(pixels::buy))
        .route("/wallet", get(wallet::get_wallet))
        .route("/wallet/purchases", get(wallet::list_purchases))
        .route("/wallet/credit", post(wallet::credit))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        .merge(api_routes)
        // Webhooks (no rate limit - controlled by Stripe)
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        .fallback(not_found)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("no such route".into())
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
