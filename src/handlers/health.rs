use std::time::Instant;

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;

use crate::AppState;

/// Tracks application start time for uptime calculation
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call this on application startup)
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn get_uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub environment: String,
    pub gateways: usize,
    pub uptime_secs: u64,
    pub timestamp: String,
}

/// GET /health
pub async fn liveness_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "up",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
        gateways: crate::services::gateway_registry::all().len(),
        uptime_secs: get_uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
