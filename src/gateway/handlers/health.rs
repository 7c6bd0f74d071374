//! Health check handler.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::Json;
use serde::Serialize;

use super::super::types::ApiResponse;

#[derive(Serialize)]
pub struct HealthResponse {
    /// Server timestamp in milliseconds.
    pub timestamp_ms: u64,
}

/// Liveness probe. No dependency details are exposed.
pub async fn health_check() -> Json<ApiResponse<HealthResponse>> {
    let timestamp_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    ApiResponse::ok(HealthResponse { timestamp_ms })
}
