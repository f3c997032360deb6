use axum::{
    extract::{RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
};
use bytes::Bytes;
use tracing::{debug, error};

use crate::services::callback_reconciler::CallbackRequest;
use crate::webhooks::AUTH_HEADER;
use crate::AppState;

/// Query arguments the vendor appends to the notification URL.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CallbackQuery {
    pub transactionid: Option<String>,
    pub timestamp: Option<String>,
}

impl CallbackQuery {
    /// Lenient parse: unknown keys are ignored and the first value of a
    /// repeated key wins.
    pub fn parse(raw: Option<&str>) -> Self {
        let mut query = Self::default();
        for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
            let slot = match key.as_ref() {
                "transactionid" => &mut query.transactionid,
                "timestamp" => &mut query.timestamp,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        query
    }
}

/// POST /multisafepay/callback
///
/// The vendor retries anything that is not a 200, so every delivery is
/// acknowledged with `OK`, including ones that could not be applied. The
/// query and body are read raw so malformed input never becomes an
/// extractor rejection.
pub async fn notification(
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let query = CallbackQuery::parse(raw_query.as_deref());
    let body = match String::from_utf8(body.to_vec()) {
        Ok(body) => body,
        Err(err) => {
            debug!(error = %err, "Notification body is not valid UTF-8");
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    };

    let request = CallbackRequest {
        transaction_id: query.transactionid,
        timestamp: query.timestamp,
        body,
        auth: headers
            .get(AUTH_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    };

    if let Err(err) = state.services.reconciler.handle(&request).await {
        error!(error = %err, transaction_id = ?request.transaction_id, "Notification could not be applied");
    }

    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], "OK")
}
