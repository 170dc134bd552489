//! API middleware and shared state
//!
//! Contains:
//! - `AppState`, the services shared by every handler
//! - `ApiError`, the JSON error envelope
//! - Write-token guard for mutating requests
//! - Request statistics reported by `/health`

use axum::{
    extract::{Request, State},
    http::{header, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use crate::services::entity::{EntityService, EntityServiceError};

// ============================================================================
// Request Statistics
// ============================================================================

/// Lock-free request counters
pub struct RequestStats {
    total_requests: AtomicU64,
    total_response_time_us: AtomicU64,
    start_time: Instant,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record one request and its duration
    pub fn record(&self, duration_us: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us.fetch_add(duration_us, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Mean response time in microseconds
    pub fn avg_response_time_us(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.total_response_time_us.load(Ordering::Relaxed) as f64 / total as f64
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: crate::db::DynDatabasePool,
    pub entity_service: Arc<EntityService>,
    /// Bearer token required for writes; `None` leaves writes open
    pub api_token: Option<Arc<str>>,
    pub request_stats: Arc<RequestStats>,
}

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<EntityServiceError> for ApiError {
    fn from(err: EntityServiceError) -> Self {
        match err {
            EntityServiceError::NotFound(what) => ApiError::not_found(format!("Not found: {}", what)),
            EntityServiceError::UnknownResource(name) => {
                ApiError::not_found(format!("Unknown resource: {}", name))
            }
            EntityServiceError::Validation(message) => ApiError::validation_error(message),
            EntityServiceError::InvalidFilter(filter) => ApiError::with_details(
                "VALIDATION_ERROR",
                "Invalid list query",
                serde_json::json!({ "reason": filter.to_string() }),
            ),
            EntityServiceError::Internal(err) => {
                error!("Entity store failure: {:#}", err);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

fn extract_bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Compare without leaking how much of the token matched
fn token_matches(candidate: &str, expected: &str) -> bool {
    candidate.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Require the configured bearer token on non-read requests
pub async fn require_write_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let read_only = matches!(*request.method(), Method::GET | Method::HEAD | Method::OPTIONS);

    if let (false, Some(expected)) = (read_only, state.api_token.as_deref()) {
        match extract_bearer_token(&request) {
            Some(token) if token_matches(token, expected) => {}
            Some(_) => return Err(ApiError::unauthorized("Invalid API token")),
            None => return Err(ApiError::unauthorized("Missing API token")),
        }
    }

    Ok(next.run(request).await)
}

/// Record request count and response time
pub async fn request_stats_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    let duration_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
    state.request_stats.record(duration_us);
    response
}
