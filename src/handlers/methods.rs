use axum::{
    extract::{Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::events::sort_payment_methods;
use crate::services::gateway_registry::{MethodQuery, PaymentMethodOption};
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PaymentMethodsParams {
    pub store_id: i64,
    pub country_id: i64,
    pub zone_id: i64,
    pub total: Decimal,
    pub currency_id: i64,
    pub currency_code: String,
    pub customer_group_id: Option<i64>,
}

/// GET /api/v1/payment-methods
pub async fn list_payment_methods(
    State(state): State<AppState>,
    Query(params): Query<PaymentMethodsParams>,
) -> ApiResult<Vec<PaymentMethodOption>> {
    let settings = state.services.settings.store_settings(params.store_id).await?;
    let query = MethodQuery {
        country_id: params.country_id,
        zone_id: params.zone_id,
        total: params.total,
        currency_id: params.currency_id,
        currency_code: params.currency_code,
        customer_group_id: params.customer_group_id,
    };

    let methods = state
        .services
        .selector
        .list_eligible_methods(&query, &settings)
        .await?;
    let methods = sort_payment_methods(methods, &settings.payment("sort_order").unwrap_or_default());

    Ok(Json(ApiResponse::success(methods)))
}
