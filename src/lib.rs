//! MultiSafepay connector library
//!
//! Payment bridge between an OpenCart storefront and MultiSafepay: shopping
//! cart assembly, callback reconciliation, gateway selection and the
//! merchant back office actions.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod client;
pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod repositories;
pub mod services;
pub mod settings;
pub mod tracing;
pub mod webhooks;

use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

// Common response wrappers
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Storefront checkout and back office API, nested under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    let checkout = Router::new()
        .route("/payment-methods", get(handlers::methods::list_payment_methods))
        .route("/checkout/assets", get(handlers::checkout::layout_assets))
        .route("/checkout/validate", post(handlers::checkout::validate))
        .route("/checkout/confirm", post(handlers::checkout::confirm))
        .route("/checkout/:gateway", get(handlers::checkout::checkout_view));

    let admin = Router::new()
        .route("/admin/refund", get(handlers::admin::refund))
        .route("/admin/status", get(handlers::admin::change_status))
        .route("/admin/order", get(handlers::admin::order_tab))
        .route("/admin/settings", post(handlers::admin::save_settings))
        .route("/admin/invoice", post(handlers::admin::create_invoice));

    Router::new().merge(checkout).merge(admin)
}

/// Full application router: vendor callback, health probe and the v1 API.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/multisafepay/callback", post(handlers::callback::notification))
        .route("/health", get(handlers::health::liveness_check))
        .nest("/api/v1", api_v1_routes())
        .layer(crate::tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn(crate::tracing::request_id_middleware))
        .with_state(state)
}
