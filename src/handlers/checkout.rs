use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::events::{header_footer_assets, LayoutAssets, LayoutPosition};
use crate::models::CheckoutSession;
use crate::services::checkout::{validate_form, CheckoutView};
use crate::services::order_request::ConfirmRequest;
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct CheckoutViewParams {
    pub order_id: i64,
    #[serde(default)]
    pub customer_id: i64,
    #[serde(default)]
    pub logged_in: bool,
}

/// GET /api/v1/checkout/:gateway
pub async fn checkout_view(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    Query(params): Query<CheckoutViewParams>,
) -> ApiResult<CheckoutView> {
    let session = CheckoutSession {
        customer_id: params.customer_id,
        logged_in: params.logged_in,
        ..Default::default()
    };
    let view = state
        .services
        .checkout
        .view(&gateway, params.order_id, &session)
        .await?;
    Ok(Json(ApiResponse::success(view)))
}

/// POST /api/v1/checkout/validate
///
/// Answers `{}` when the form is fine, `{"error": {field: message}}`
/// otherwise.
pub async fn validate(Json(form): Json<HashMap<String, String>>) -> Response {
    let errors = validate_form(&form);
    if errors.is_empty() {
        return Json(json!({})).into_response();
    }
    Json(json!({ "error": errors })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ConfirmBody {
    #[serde(flatten)]
    pub request: ConfirmRequest,
    #[serde(default)]
    pub session: CheckoutSession,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub redirect: String,
}

/// POST /api/v1/checkout/confirm
///
/// Vendor rejections surface as the generic payment error message.
pub async fn confirm(
    State(state): State<AppState>,
    Json(body): Json<ConfirmBody>,
) -> ApiResult<ConfirmResponse> {
    let created = state
        .services
        .payments
        .confirm(&body.request, &body.session)
        .await?;
    Ok(Json(ApiResponse::success(ConfirmResponse {
        redirect: created.payment_url,
    })))
}

#[derive(Debug, Deserialize)]
pub struct AssetsParams {
    pub route: String,
    pub position: LayoutPosition,
    #[serde(default)]
    pub store_id: i64,
}

/// GET /api/v1/checkout/assets
pub async fn layout_assets(
    State(state): State<AppState>,
    Query(params): Query<AssetsParams>,
) -> ApiResult<LayoutAssets> {
    let settings = state.services.settings.store_settings(params.store_id).await?;
    Ok(Json(ApiResponse::success(header_footer_assets(
        &params.route,
        params.position,
        &settings,
    ))))
}
