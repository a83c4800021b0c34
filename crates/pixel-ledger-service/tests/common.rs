//! Common test utilities for pixel-ledger integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue};
use axum::Router;
use axum_test::TestServer;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use tempfile::TempDir;

use pixel_ledger_core::{AccountId, TopUpSource};
use pixel_ledger_service::auth::JwtClaims;
use pixel_ledger_service::crypto::hmac_sha256_hex;
use pixel_ledger_service::{create_router, AppState, ServiceConfig};
use pixel_ledger_store::{Ledger, RocksStore};

/// Secret used to sign session tokens in tests.
pub const JWT_SECRET: &str = "test-jwt-secret";

/// Admin API key used in tests.
pub const ADMIN_KEY: &str = "test-admin-key";

/// Stripe webhook secret used in tests.
pub const STRIPE_SECRET: &str = "whsec_test_secret";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Direct handle on the ledger behind the server.
    pub ledger: Arc<Ledger<RocksStore>>,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// A test account for authenticated requests.
    pub test_account_id: AccountId,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a harness after adjusting the default test configuration.
    pub fn with_config(adjust: impl FnOnce(&mut ServiceConfig)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RocksStore::open(temp_dir.path()).expect("Failed to open store");

        let mut config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            auth_jwt_secret: Some(JWT_SECRET.into()),
            admin_api_key: Some(ADMIN_KEY.into()),
            stripe_webhook_secret: Some(STRIPE_SECRET.into()),
            ..ServiceConfig::default()
        };
        adjust(&mut config);

        let state = AppState::new(store, config).expect("Failed to build state");
        let ledger = Arc::clone(&state.ledger);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            ledger,
            _temp_dir: temp_dir,
            test_account_id: AccountId::generate(),
        }
    }

    /// Authorization header for the test account.
    pub fn user_auth_header(&self) -> HeaderValue {
        bearer_for(&self.test_account_id)
    }

    /// Credit the test account directly through the ledger.
    pub fn fund(&self, amount_cents: i64) {
        self.ledger
            .credit(
                &self.test_account_id,
                amount_cents,
                &format!("seed-{}", AccountId::generate()),
                TopUpSource::Admin,
            )
            .expect("Failed to fund test account");
    }

    /// Buy a cell as the test account and return the response.
    pub async fn buy(&self, cell_index: i64, color: &str, intensity: i64) -> axum_test::TestResponse {
        self.server
            .post("/pixels/buy")
            .add_header(header::AUTHORIZATION, self.user_auth_header())
            .json(&json!({
                "cellIndex": cell_index,
                "color": color,
                "intensity": intensity
            }))
            .await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Mint a valid session token for `account_id`.
pub fn token_for(account_id: &AccountId) -> String {
    sign_token(&account_id.to_string(), JWT_SECRET, 3600)
}

/// Sign arbitrary claims.
pub fn sign_token(sub: &str, secret: &str, expires_in: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = JwtClaims {
        sub: sub.into(),
        iss: None,
        exp: now + expires_in,
        iat: now,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to sign token")
}

/// `Bearer <token>` header value for `account_id`.
pub fn bearer_for(account_id: &AccountId) -> HeaderValue {
    bearer(&token_for(account_id))
}

/// `Bearer <token>` header value.
pub fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).expect("Invalid header value")
}

/// Admin key header name.
pub fn admin_key_header() -> HeaderName {
    HeaderName::from_static("x-admin-key")
}

/// Stripe signature header name.
pub fn stripe_signature_header() -> HeaderName {
    HeaderName::from_static("stripe-signature")
}

/// A valid `Stripe-Signature` value for `payload`.
pub fn stripe_signature(payload: &str) -> HeaderValue {
    let timestamp = chrono::Utc::now().timestamp();
    let signature = hmac_sha256_hex(STRIPE_SECRET, &format!("{timestamp}.{payload}"))
        .expect("Failed to sign payload");
    HeaderValue::from_str(&format!("t={timestamp},v1={signature}")).expect("Invalid header value")
}
