//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use pixel_ledger_core::{CellIndex, LedgerError};

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or invalid credentials.
    #[error("authentication required")]
    Unauthorized,

    /// Unknown route or resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed cell index, color, intensity, amount or body.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Window request too large or malformed.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// Webhook payload or signature rejected.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Wallet cannot cover the price.
    #[error("insufficient funds: balance={balance}, required={required}")]
    InsufficientFunds {
        /// Current balance in cents.
        balance: i64,
        /// Price in cents.
        required: i64,
    },

    /// The cell has reached its purchase cap.
    #[error("cell {index} has reached its purchase limit ({purchase_count})")]
    PriceCapReached {
        /// The capped cell.
        index: CellIndex,
        /// Its purchase count.
        purchase_count: u32,
    },

    /// Contention did not clear within the retry budget.
    #[error("service busy: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "auth_required",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::InvalidInput(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_input", msg.clone(), None)
            }
            Self::InvalidRange(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_range", msg.clone(), None)
            }
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::InsufficientFunds { balance, required } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_funds",
                self.to_string(),
                Some(serde_json::json!({
                    "balance": balance,
                    "required": required
                })),
            ),
            Self::PriceCapReached {
                index,
                purchase_count,
            } => (
                StatusCode::CONFLICT,
                "price_cap_reached",
                self.to_string(),
                Some(serde_json::json!({
                    "cellIndex": index,
                    "purchaseCount": purchase_count
                })),
            ),
            Self::Unavailable(msg) => {
                tracing::warn!(reason = %msg, "Request abandoned under contention");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "retries_exhausted",
                    "The cell is busy, please retry".to_string(),
                    None,
                )
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AuthRequired => Self::Unauthorized,
            LedgerError::InvalidInput(msg) | LedgerError::InvalidAmount(msg) => {
                Self::InvalidInput(msg)
            }
            LedgerError::InvalidId(e) => Self::InvalidInput(e.to_string()),
            LedgerError::InvalidRange(msg) => Self::InvalidRange(msg),
            LedgerError::InsufficientFunds { balance, required } => {
                Self::InsufficientFunds { balance, required }
            }
            LedgerError::PriceCapReached {
                index,
                purchase_count,
            } => Self::PriceCapReached {
                index,
                purchase_count,
            },
            err @ (LedgerError::TransientConflict | LedgerError::RetriesExhausted { .. }) => {
                Self::Unavailable(err.to_string())
            }
            LedgerError::Storage(msg) | LedgerError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("ledger task failed: {err}"))
    }
}
