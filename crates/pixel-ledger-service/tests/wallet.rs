//! Wallet and admin credit integration tests.

mod common;

use axum::http::{header, HeaderValue};
use common::{admin_key_header, bearer, bearer_for, sign_token, TestHarness, ADMIN_KEY, JWT_SECRET};
use pixel_ledger_core::AccountId;
use serde_json::json;

fn admin_key() -> HeaderValue {
    HeaderValue::from_static(ADMIN_KEY)
}

#[tokio::test]
async fn wallet_requires_auth() {
    let harness = TestHarness::new();

    let response = harness.server.get("/wallet").await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn fresh_wallet_is_empty() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/wallet")
        .add_header(header::AUTHORIZATION, harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["accountId"], harness.test_account_id.to_string());
    assert_eq!(body["balanceCents"], 0);
    assert_eq!(body["purchaseCount"], 0);
}

#[tokio::test]
async fn wallet_tracks_credits_and_spend() {
    let harness = TestHarness::new();
    harness.fund(10);
    harness.buy(1, "#ffffff", 0).await.assert_status_ok();
    harness.buy(1, "#ffffff", 0).await.assert_status_ok();

    let body: serde_json::Value = harness
        .server
        .get("/wallet")
        .add_header(header::AUTHORIZATION, harness.user_auth_header())
        .await
        .json();

    assert_eq!(body["balanceCents"], 7);
    assert_eq!(body["lifetimeCreditedCents"], 10);
    assert_eq!(body["lifetimeSpentCents"], 3);
    assert_eq!(body["purchaseCount"], 2);
}

#[tokio::test]
async fn token_problems_are_401() {
    let harness = TestHarness::new();

    for token in [
        sign_token(&harness.test_account_id.to_string(), JWT_SECRET, -3600),
        sign_token("user-42", JWT_SECRET, 3600),
    ] {
        harness
            .server
            .get("/wallet")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .assert_status_unauthorized();
    }

    harness
        .server
        .get("/wallet")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="))
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn purchases_are_listed_newest_first() {
    let harness = TestHarness::new();
    harness.fund(100);
    harness.buy(10, "#000001", 0).await.assert_status_ok();
    harness.buy(20, "#000002", 0).await.assert_status_ok();
    harness.buy(30, "#000003", 0).await.assert_status_ok();

    let response = harness
        .server
        .get("/wallet/purchases")
        .add_header(header::AUTHORIZATION, harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let purchases = body["purchases"].as_array().unwrap();
    assert_eq!(purchases.len(), 3);
    let cells: Vec<_> = purchases.iter().map(|p| p["cellIndex"].clone()).collect();
    assert_eq!(cells, vec![json!(30), json!(20), json!(10)]);
    assert_eq!(purchases[0]["accountId"], harness.test_account_id.to_string());

    let other: serde_json::Value = harness
        .server
        .get("/wallet/purchases")
        .add_header(header::AUTHORIZATION, bearer_for(&AccountId::generate()))
        .await
        .json();
    assert_eq!(other["purchases"], json!([]));
}

// ============================================================================
// Admin credit
// ============================================================================

#[tokio::test]
async fn admin_credit_tops_up_wallet() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/wallet/credit")
        .add_header(admin_key_header(), admin_key())
        .json(&json!({
            "accountId": harness.test_account_id.to_string(),
            "amountCents": 250,
            "reference": "manual-1"
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["amountCents"], 250);
    assert_eq!(body["balanceAfterCents"], 250);
    assert_eq!(body["alreadyApplied"], false);

    assert_eq!(harness.ledger.balance(&harness.test_account_id).unwrap(), 250);
}

#[tokio::test]
async fn replayed_reference_is_not_credited_twice() {
    let harness = TestHarness::new();
    let body = json!({
        "accountId": harness.test_account_id.to_string(),
        "amountCents": 100,
        "reference": "manual-replay"
    });

    for expected_replay in [false, true] {
        let response = harness
            .server
            .post("/wallet/credit")
            .add_header(admin_key_header(), admin_key())
            .json(&body)
            .await;
        response.assert_status_ok();
        let receipt: serde_json::Value = response.json();
        assert_eq!(receipt["alreadyApplied"], expected_replay);
        assert_eq!(receipt["balanceAfterCents"], 100);
    }

    assert_eq!(harness.ledger.balance(&harness.test_account_id).unwrap(), 100);
}

#[tokio::test]
async fn credit_requires_admin_key() {
    let harness = TestHarness::new();
    let body = json!({
        "accountId": harness.test_account_id.to_string(),
        "amountCents": 100,
        "reference": "manual-2"
    });

    harness
        .server
        .post("/wallet/credit")
        .json(&body)
        .await
        .assert_status_unauthorized();

    harness
        .server
        .post("/wallet/credit")
        .add_header(admin_key_header(), HeaderValue::from_static("not-the-key"))
        .json(&body)
        .await
        .assert_status_unauthorized();

    // A user session is not an admin credential.
    harness
        .server
        .post("/wallet/credit")
        .add_header(header::AUTHORIZATION, harness.user_auth_header())
        .json(&body)
        .await
        .assert_status_unauthorized();

    assert_eq!(harness.ledger.balance(&harness.test_account_id).unwrap(), 0);
}

#[tokio::test]
async fn credit_rejects_bad_amounts() {
    let harness = TestHarness::new();

    for (amount, reference) in [(0, "zero"), (-5, "negative")] {
        let response = harness
            .server
            .post("/wallet/credit")
            .add_header(admin_key_header(), admin_key())
            .json(&json!({
                "accountId": harness.test_account_id.to_string(),
                "amountCents": amount,
                "reference": reference
            }))
            .await;

        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"]["code"], "invalid_input");
    }

    harness
        .server
        .post("/wallet/credit")
        .add_header(admin_key_header(), admin_key())
        .json(&json!({"accountId": "nope", "amountCents": 5, "reference": "x"}))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn credit_is_disabled_without_admin_key() {
    let harness = TestHarness::with_config(|config| config.admin_api_key = None);

    harness
        .server
        .post("/wallet/credit")
        .add_header(admin_key_header(), admin_key())
        .json(&json!({
            "accountId": harness.test_account_id.to_string(),
            "amountCents": 5,
            "reference": "disabled"
        }))
        .await
        .assert_status_unauthorized();
}
