use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::ServiceError;
use crate::services::admin::{ActionResult, OrderSummary, SettingsResult, StatusChange};
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct OrderParams {
    pub order_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub order_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StoreParams {
    pub store_id: i64,
}

/// GET /api/v1/admin/refund
pub async fn refund(
    State(state): State<AppState>,
    Query(params): Query<OrderParams>,
) -> Result<Json<ActionResult>, ServiceError> {
    let result = state.services.admin.refund_order(params.order_id).await?;
    Ok(Json(result))
}

/// GET /api/v1/admin/status
pub async fn change_status(
    State(state): State<AppState>,
    Query(params): Query<StatusParams>,
) -> Result<Json<ActionResult>, ServiceError> {
    let change: StatusChange = params.kind.parse()?;
    let result = state
        .services
        .admin
        .change_order_status(params.order_id, change)
        .await?;
    Ok(Json(result))
}

/// GET /api/v1/admin/order
pub async fn order_tab(
    State(state): State<AppState>,
    Query(params): Query<OrderParams>,
) -> ApiResult<Option<OrderSummary>> {
    let summary = state.services.admin.order_summary(params.order_id).await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// POST /api/v1/admin/settings
pub async fn save_settings(
    State(state): State<AppState>,
    Query(params): Query<StoreParams>,
    Json(form): Json<HashMap<String, Value>>,
) -> Result<Json<SettingsResult>, ServiceError> {
    let result = state.services.admin.save_settings(params.store_id, form).await?;
    Ok(Json(result))
}

/// POST /api/v1/admin/invoice
///
/// Invoice numbering hook; returns the invoice id sent to the vendor.
pub async fn create_invoice(
    State(state): State<AppState>,
    Query(params): Query<OrderParams>,
) -> ApiResult<Option<String>> {
    let invoice_id = state
        .services
        .events
        .create_invoice_no_before(params.order_id)
        .await?;
    Ok(Json(ApiResponse::success(invoice_id)))
}
