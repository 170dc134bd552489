//! Resource API endpoints
//!
//! One set of handlers serves every catalogue resource:
//! - GET    /api/{resource}      - Paginated, filtered, sorted list
//! - GET    /api/{resource}/{id} - Single record by id or slug
//! - POST   /api/{resource}      - Create
//! - PUT    /api/{resource}/{id} - Update (attributes merge)
//! - DELETE /api/{resource}/{id} - Delete
//!
//! Unknown resources answer 404.

use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::common::parse_query;
use crate::api::middleware::{ApiError, AppState};
use crate::models::{Entity, ListQuery, ListResponse, Resource, SingleResponse};

/// Write request body: `{ "data": { ... } }`
#[derive(Debug, Deserialize)]
pub struct EntryBody {
    #[serde(default)]
    pub data: Value,
}

/// Build the resources router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{resource}", get(list_entries).post(create_entry))
        .route(
            "/{resource}/{id}",
            get(get_entry).put(update_entry).delete(delete_entry),
        )
}

fn resolve(segment: &str) -> Result<Resource, ApiError> {
    segment
        .parse::<Resource>()
        .map_err(|e| ApiError::not_found(e.to_string()))
}

/// GET /api/{resource}
async fn list_entries(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<ListResponse<Entity>>, ApiError> {
    let resource = resolve(&resource)?;
    let params = parse_query(query.as_deref().unwrap_or_default());
    let list_query = ListQuery::from_params(&params);

    let response = state.entity_service.find(resource, &list_query).await?;
    Ok(Json(response))
}

/// GET /api/{resource}/{id}
async fn get_entry(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Json<SingleResponse<Entity>>, ApiError> {
    let resource = resolve(&resource)?;
    let entity = state.entity_service.find_one(resource, &id).await?;
    Ok(Json(SingleResponse::new(entity)))
}

/// POST /api/{resource}
async fn create_entry(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(body): Json<EntryBody>,
) -> Result<(StatusCode, Json<SingleResponse<Entity>>), ApiError> {
    let resource = resolve(&resource)?;
    let entity = state.entity_service.create(resource, body.data).await?;
    Ok((StatusCode::CREATED, Json(SingleResponse::new(entity))))
}

/// PUT /api/{resource}/{id}
async fn update_entry(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Json(body): Json<EntryBody>,
) -> Result<Json<SingleResponse<Entity>>, ApiError> {
    let resource = resolve(&resource)?;
    let entity = state.entity_service.update(resource, &id, body.data).await?;
    Ok(Json(SingleResponse::new(entity)))
}

/// DELETE /api/{resource}/{id}
async fn delete_entry(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Json<SingleResponse<Entity>>, ApiError> {
    let resource = resolve(&resource)?;
    let entity = state.entity_service.delete(resource, &id).await?;
    Ok(Json(SingleResponse::new(entity)))
}
