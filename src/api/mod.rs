//! API layer - HTTP handlers and routing
//!
//! - Resource endpoints under the configured prefix (default `/api`)
//! - `/health`
//!
//! Mutating requests pass through the write-token guard when a token is
//! configured.

pub mod common;
pub mod health;
pub mod middleware;
pub mod resources;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use middleware::{ApiError, AppState, RequestStats};

/// Build the resource API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    resources::router().route_layer(axum_middleware::from_fn_with_state(
        state,
        middleware::require_write_token,
    ))
}

fn cors_layer(cors_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if cors_origin == "*" {
        return cors.allow_origin(Any);
    }
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            warn!("Invalid CORS origin {:?}, allowing any origin", cors_origin);
            cors.allow_origin(Any)
        }
    }
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, prefix: &str, cors_origin: &str) -> Router {
    let api = build_api_router(state.clone());
    let prefix = prefix.trim_end_matches('/');

    let routes = Router::new().route("/health", get(health::health));
    let routes = if prefix.is_empty() {
        routes.merge(api)
    } else {
        routes.nest(prefix, api)
    };

    routes
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state)
}
