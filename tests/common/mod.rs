//! Shared setup for router-level tests

#![allow(dead_code)]

use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;

use waldo::api::{self, AppState, RequestStats};
use waldo::cache::MemoryCache;
use waldo::db::{create_test_pool, migrations, repositories::SqlxEntityRepository};
use waldo::models::{PageLimits, Resource};
use waldo::services::EntityService;

/// Router over a fresh in-memory store, mounted at `/api`
pub async fn app(token: Option<&str>) -> (Router, AppState) {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let state = AppState {
        pool: pool.clone(),
        entity_service: Arc::new(EntityService::new(
            SqlxEntityRepository::boxed(pool),
            Arc::new(MemoryCache::new()),
            PageLimits::default(),
        )),
        api_token: token.map(Arc::from),
        request_stats: Arc::new(RequestStats::new()),
    };

    (api::build_router(state.clone(), "/api", "*"), state)
}

/// Create a record straight through the service
pub async fn seed(state: &AppState, resource: Resource, data: Value) -> Value {
    let entity = state
        .entity_service
        .create(resource, data)
        .await
        .expect("Failed to seed record");
    serde_json::to_value(entity).expect("Failed to serialize record")
}

/// `Condition 01` .. `Condition {count}`, inserted in reverse name order
pub async fn seed_conditions(state: &AppState, count: usize) {
    for i in (1..=count).rev() {
        seed(state, Resource::Conditions, json!({ "name": format!("Condition {:02}", i) })).await;
    }
}

pub fn names(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
