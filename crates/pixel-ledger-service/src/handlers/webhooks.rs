//! Stripe webhook handler.
//!
//! Completed, paid checkout sessions top up the wallet named by
//! `client_reference_id`. The session ID is the top-up reference, so Stripe's
//! at-least-once redelivery never credits twice.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use pixel_ledger_core::{AccountId, TopUpSource};

use crate::crypto::verify_stripe_signature;
use crate::error::ApiError;
use crate::state::AppState;

/// Stripe webhook payload (simplified).
#[derive(Debug, Deserialize)]
pub struct StripeWebhook {
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event ID.
    pub id: String,
    /// Event data.
    pub data: StripeEventData,
}

/// Stripe event data container.
#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    /// Event object.
    pub object: serde_json::Value,
}

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was processed.
    pub received: bool,
}

/// Handle Stripe webhooks.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    if let Some(webhook_secret) = &state.config.stripe_webhook_secret {
        let signature = headers
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::BadRequest("Missing Stripe signature".into()))?;

        verify_stripe_signature(
            &body,
            signature,
            webhook_secret,
            chrono::Utc::now().timestamp(),
        )
        .map_err(|e| {
            tracing::warn!(error = %e, "Invalid Stripe webhook signature");
            ApiError::BadRequest("Invalid webhook signature".into())
        })?;
    } else {
        // Development mode
        tracing::warn!("Stripe webhook_secret not configured - skipping signature verification");
    }

    let webhook: StripeWebhook =
        serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(
        event_type = %webhook.event_type,
        event_id = %webhook.id,
        "Received Stripe webhook"
    );

    match webhook.event_type.as_str() {
        "checkout.session.completed" => {
            handle_checkout_completed(&state, &webhook.data.object).await?;
        }
        _ => {
            tracing::debug!(event_type = %webhook.event_type, "Unhandled Stripe event");
        }
    }

    Ok(Json(WebhookResponse { received: true }))
}

async fn handle_checkout_completed(
    state: &AppState,
    data: &serde_json::Value,
) -> Result<(), ApiError> {
    let account_id_str = data
        .get("client_reference_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ApiError::BadRequest("Missing client_reference_id".into()))?;

    let session_id = data
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ApiError::BadRequest("Missing checkout session id".into()))?
        .to_string();

    let payment_status = data
        .get("payment_status")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");

    if payment_status != "paid" {
        tracing::info!(
            session_id = %session_id,
            payment_status = %payment_status,
            "Checkout session not paid yet, skipping"
        );
        return Ok(());
    }

    let credits_amount = data
        .get("metadata")
        .and_then(|m| m.get("credits_amount"))
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<i64>().ok())
        .or_else(|| data.get("amount_total").and_then(serde_json::Value::as_i64))
        .ok_or_else(|| ApiError::BadRequest("Missing credits amount".into()))?;

    let account_id: AccountId = account_id_str
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid account id: {account_id_str}")))?;

    tracing::info!(
        account_id = %account_id,
        session_id = %session_id,
        credits_amount,
        "Processing checkout completion"
    );

    let ledger = Arc::clone(&state.ledger);
    let receipt = tokio::task::spawn_blocking(move || {
        ledger.credit(&account_id, credits_amount, &session_id, TopUpSource::Stripe)
    })
    .await??;

    if receipt.already_applied {
        tracing::info!(
            reference = %receipt.top_up.reference,
            "Checkout session already credited"
        );
    }

    Ok(())
}
