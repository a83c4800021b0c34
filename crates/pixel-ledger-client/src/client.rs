//! Pixel ledger HTTP client implementation.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};

use pixel_ledger_core::{CellIndex, CellView, Color, Intensity, PurchaseReceipt};

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, BuyRequest, CellHistory, GridInfo, HealthResponse, Page, PurchaseList,
    Wallet, Window,
};

/// Pixel ledger API client.
///
/// Reads are anonymous. Purchases and wallet calls need a session token,
/// supplied with [`LedgerClient::with_token`].
#[derive(Debug, Clone)]
pub struct LedgerClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl LedgerClient {
    /// Create a new anonymous client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the service (e.g., `"http://pixel-ledger:8080"`)
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(base_url, ClientOptions::default())
    }

    /// Create a new client with custom options.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Attach a session token for authenticated calls.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Check service health.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.send(self.client.get(self.url("/health"))).await
    }

    /// Fetch the grid geometry and pricing constants.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn grid(&self) -> Result<GridInfo, ClientError> {
        self.send(self.client.get(self.url("/grid"))).await
    }

    /// Fetch the purchased cells in `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects the range.
    pub async fn window(&self, start: u32, end: u32) -> Result<Window, ClientError> {
        let request = self
            .client
            .get(self.url("/pixels/get"))
            .query(&[("start", start), ("end", end)]);

        self.send(request).await
    }

    /// Fetch one cell with the price of its next purchase.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn cell(&self, index: CellIndex) -> Result<CellView, ClientError> {
        let url = self.url(&format!("/pixels/cell/{index}"));
        self.send(self.client.get(url)).await
    }

    /// Fetch a cell's purchases, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn cell_history(
        &self,
        index: CellIndex,
        page: Page,
    ) -> Result<CellHistory, ClientError> {
        let url = self.url(&format!("/pixels/cell/{index}/history"));
        self.send(self.client.get(url).query(&page)).await
    }

    /// Buy a cell.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InsufficientFunds` or
    /// `ClientError::PriceCapReached` when the purchase is declined, and
    /// `ClientError::Unauthorized` without a valid token.
    pub async fn buy(
        &self,
        index: CellIndex,
        color: Color,
        intensity: Option<Intensity>,
    ) -> Result<PurchaseReceipt, ClientError> {
        let body = BuyRequest {
            cell_index: index.get(),
            color: color.to_string(),
            intensity: intensity.map(Intensity::get),
        };

        tracing::debug!(cell = %index, color = %color, "Submitting purchase");

        let request = self.authorized(self.client.post(self.url("/pixels/buy")))?;
        self.send(request.json(&body)).await
    }

    /// Fetch the caller's wallet.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn wallet(&self) -> Result<Wallet, ClientError> {
        let request = self.authorized(self.client.get(self.url("/wallet")))?;
        self.send(request).await
    }

    /// Fetch the caller's purchases, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn purchases(&self, page: Page) -> Result<PurchaseList, ClientError> {
        let request = self.authorized(self.client.get(self.url("/wallet/purchases")))?;
        self.send(request.query(&page)).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::Unauthorized)?;
        Ok(request.bearer_auth(token))
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => {
                let details = api_error.error.details.as_ref();
                let detail = |key: &str| {
                    details
                        .and_then(|d| d.get(key))
                        .and_then(serde_json::Value::as_i64)
                        .unwrap_or(0)
                };

                match api_error.error.code.as_str() {
                    "auth_required" => Err(ClientError::Unauthorized),
                    "insufficient_funds" => Err(ClientError::InsufficientFunds {
                        balance: detail("balance"),
                        required: detail("required"),
                    }),
                    "price_cap_reached" => Err(ClientError::PriceCapReached {
                        index: CellIndex::new(u32::try_from(detail("cellIndex")).unwrap_or(0)),
                        purchase_count: u32::try_from(detail("purchaseCount")).unwrap_or(0),
                    }),
                    "retries_exhausted" => Err(ClientError::Busy(api_error.error.message)),
                    code => Err(ClientError::Api {
                        code: code.to_string(),
                        message: api_error.error.message,
                        status: status.as_u16(),
                    }),
                }
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
        }
    }
}
