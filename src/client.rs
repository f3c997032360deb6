//! Client for the MultiSafepay JSON API.
//!
//! Every call is a single attempt with the configured timeout. Failures come
//! back as [`ServiceError::ExternalApiError`] carrying the vendor's error code
//! and message so callers can log them for the merchant.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::models::Transaction;
use crate::services::order_request::OrderRequest;
use crate::settings::StoreSettings;

/// Vendor error code for an unknown order id.
const UNKNOWN_ORDER_CODE: i64 = 1006;

#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub api_key: String,
    pub test_mode: bool,
}

impl ApiCredentials {
    pub fn from_settings(settings: &StoreSettings) -> Self {
        Self {
            api_key: settings.api_key(),
            test_mode: settings.is_test_mode(),
        }
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &"***")
            .field("test_mode", &self.test_mode)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedOrder {
    #[serde(default)]
    pub order_id: String,
    pub payment_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuer {
    pub code: String,
    pub description: String,
}

/// Partial update of a vendor transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefundItem {
    pub merchant_item_id: String,
    /// Negative: the quantity taken back
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefundCheckoutData {
    pub items: Vec<RefundItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefundRequest {
    pub currency: String,
    /// Minor units
    pub amount: i64,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_data: Option<RefundCheckoutData>,
}

#[async_trait]
pub trait PaymentClient: Send + Sync {
    async fn create_order(
        &self,
        credentials: &ApiCredentials,
        request: &OrderRequest,
    ) -> Result<CreatedOrder, ServiceError>;

    /// `None` when the vendor does not know the order.
    async fn get_order(
        &self,
        credentials: &ApiCredentials,
        order_id: &str,
    ) -> Result<Option<Transaction>, ServiceError>;

    async fn update_order(
        &self,
        credentials: &ApiCredentials,
        order_id: &str,
        update: &OrderUpdate,
    ) -> Result<(), ServiceError>;

    async fn refund_order(
        &self,
        credentials: &ApiCredentials,
        order_id: &str,
        refund: &RefundRequest,
    ) -> Result<(), ServiceError>;

    async fn issuers(
        &self,
        credentials: &ApiCredentials,
        gateway_id: &str,
    ) -> Result<Vec<Issuer>, ServiceError>;

    /// Short lived token for the payment component.
    async fn api_token(&self, credentials: &ApiCredentials) -> Result<String, ServiceError>;

    /// Stored card tokens of a customer for one gateway.
    async fn tokens(
        &self,
        credentials: &ApiCredentials,
        customer_reference: &str,
        gateway_id: &str,
    ) -> Result<Vec<Value>, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    error_info: Option<String>,
}

impl Envelope {
    /// Error code and message, read from the top level or from `data`.
    fn failure(&self) -> (Option<i64>, String) {
        let code = self
            .error_code
            .or_else(|| self.data.get("error_code").and_then(Value::as_i64));
        let info = self
            .error_info
            .clone()
            .or_else(|| {
                self.data
                    .get("error_info")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "unknown error".to_string());
        (code, info)
    }
}

/// HTTP implementation over `reqwest`.
#[derive(Clone)]
pub struct MultiSafepayClient {
    http: reqwest::Client,
    live_base_url: String,
    test_base_url: String,
}

impl MultiSafepayClient {
    pub fn new(
        live_base_url: impl Into<String>,
        test_base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("multisafepay-connector/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            live_base_url: live_base_url.into().trim_end_matches('/').to_string(),
            test_base_url: test_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        Self::new(
            config.live_api_base_url.clone(),
            config.test_api_base_url.clone(),
            config.request_timeout(),
        )
    }

    fn base_url(&self, credentials: &ApiCredentials) -> &str {
        if credentials.test_mode {
            &self.test_base_url
        } else {
            &self.live_base_url
        }
    }

    async fn send(
        &self,
        credentials: &ApiCredentials,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, Envelope), ServiceError> {
        let url = format!("{}{}", self.base_url(credentials), path);
        debug!(%method, %url, "Calling MultiSafepay");

        let mut request = self
            .http
            .request(method, &url)
            .header("api_key", credentials.api_key.as_str())
            .header("accept", "application/json");
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let envelope = serde_json::from_str::<Envelope>(&text).map_err(|e| {
            warn!(%status, "MultiSafepay returned an unreadable body");
            ServiceError::ExternalApiError(format!("invalid response ({}): {}", status, e))
        })?;
        metrics::counter!("multisafepay.api.requests", 1);
        Ok((status, envelope))
    }

    fn ensure_success(status: StatusCode, envelope: Envelope) -> Result<Value, ServiceError> {
        if envelope.success {
            return Ok(envelope.data);
        }
        let (code, info) = envelope.failure();
        metrics::counter!("multisafepay.api.failures", 1);
        Err(ServiceError::ExternalApiError(match code {
            Some(code) => format!("{} {}", code, info),
            None => format!("{} {}", status.as_u16(), info),
        }))
    }
}

fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

#[async_trait]
impl PaymentClient for MultiSafepayClient {
    #[instrument(skip(self, credentials, request), fields(order_id = %request.order_id))]
    async fn create_order(
        &self,
        credentials: &ApiCredentials,
        request: &OrderRequest,
    ) -> Result<CreatedOrder, ServiceError> {
        let body = serde_json::to_value(request)?;
        let (status, envelope) = self.send(credentials, Method::POST, "/orders", Some(body)).await?;
        let data = Self::ensure_success(status, envelope)?;
        Ok(serde_json::from_value(data)?)
    }

    #[instrument(skip(self, credentials))]
    async fn get_order(
        &self,
        credentials: &ApiCredentials,
        order_id: &str,
    ) -> Result<Option<Transaction>, ServiceError> {
        let path = format!("/orders/{}", encode_segment(order_id));
        let (status, envelope) = self.send(credentials, Method::GET, &path, None).await?;
        if !envelope.success {
            let (code, _) = envelope.failure();
            if status == StatusCode::NOT_FOUND || code == Some(UNKNOWN_ORDER_CODE) {
                return Ok(None);
            }
        }
        let data = Self::ensure_success(status, envelope)?;
        Ok(Some(serde_json::from_value(data)?))
    }

    #[instrument(skip(self, credentials))]
    async fn update_order(
        &self,
        credentials: &ApiCredentials,
        order_id: &str,
        update: &OrderUpdate,
    ) -> Result<(), ServiceError> {
        let path = format!("/orders/{}", encode_segment(order_id));
        let body = serde_json::to_value(update)?;
        let (status, envelope) = self.send(credentials, Method::PATCH, &path, Some(body)).await?;
        Self::ensure_success(status, envelope).map(|_| ())
    }

    #[instrument(skip(self, credentials, refund))]
    async fn refund_order(
        &self,
        credentials: &ApiCredentials,
        order_id: &str,
        refund: &RefundRequest,
    ) -> Result<(), ServiceError> {
        let path = format!("/orders/{}/refunds", encode_segment(order_id));
        let body = serde_json::to_value(refund)?;
        let (status, envelope) = self.send(credentials, Method::POST, &path, Some(body)).await?;
        Self::ensure_success(status, envelope).map(|_| ())
    }

    #[instrument(skip(self, credentials))]
    async fn issuers(
        &self,
        credentials: &ApiCredentials,
        gateway_id: &str,
    ) -> Result<Vec<Issuer>, ServiceError> {
        let path = format!("/issuers/{}", encode_segment(gateway_id));
        let (status, envelope) = self.send(credentials, Method::GET, &path, None).await?;
        let data = Self::ensure_success(status, envelope)?;
        if data.is_null() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_value(data)?)
    }

    #[instrument(skip(self, credentials))]
    async fn api_token(&self, credentials: &ApiCredentials) -> Result<String, ServiceError> {
        let (status, envelope) = self
            .send(credentials, Method::GET, "/auth/api_token", None)
            .await?;
        let data = Self::ensure_success(status, envelope)?;
        data.get("api_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ServiceError::ExternalApiError("api_token missing".to_string()))
    }

    #[instrument(skip(self, credentials))]
    async fn tokens(
        &self,
        credentials: &ApiCredentials,
        customer_reference: &str,
        gateway_id: &str,
    ) -> Result<Vec<Value>, ServiceError> {
        let path = format!("/recurring/{}", encode_segment(customer_reference));
        let (status, envelope) = self.send(credentials, Method::GET, &path, None).await?;
        let data = Self::ensure_success(status, envelope)?;
        let tokens = data
            .get("tokens")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(tokens
            .into_iter()
            .filter(|token| token.get("code").and_then(Value::as_str) == Some(gateway_id))
            .collect())
    }
}
