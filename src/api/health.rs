//! Health endpoint
//!
//! GET /health - database ping plus request statistics

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;

use crate::api::middleware::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub avg_response_time_us: f64,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database_ok = match state.pool.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("Health check database ping failed: {:#}", e);
            false
        }
    };

    let stats = &state.request_stats;
    let body = HealthResponse {
        status: if database_ok { "ok" } else { "degraded" },
        database: if database_ok { "up" } else { "down" },
        uptime_seconds: stats.uptime_seconds(),
        total_requests: stats.total_requests(),
        avg_response_time_us: stats.avg_response_time_us(),
    };
    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(body))
}
