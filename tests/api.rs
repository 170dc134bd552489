//! Router-level tests for the resource API

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use common::{app, names, seed, seed_conditions};
use waldo::models::Resource;

#[tokio::test]
async fn test_second_page_of_conditions() {
    let (router, state) = app(None).await;
    seed_conditions(&state, 25).await;
    let server = TestServer::new(router).unwrap();

    let response = server
        .get("/api/conditions")
        .add_query_param("pagination[page]", 2)
        .add_query_param("pagination[pageSize]", 10)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    let expected: Vec<String> = (11..=20).map(|i| format!("Condition {:02}", i)).collect();
    assert_eq!(names(&body), expected);
    assert_eq!(
        body["meta"]["pagination"],
        json!({ "page": 2, "pageSize": 10, "pageCount": 3, "total": 25 })
    );
}

#[tokio::test]
async fn test_page_past_the_end_is_empty() {
    let (router, state) = app(None).await;
    seed_conditions(&state, 25).await;
    let server = TestServer::new(router).unwrap();

    let body: Value = server
        .get("/api/conditions")
        .add_query_param("pagination[page]", 9)
        .add_query_param("pagination[pageSize]", 10)
        .await
        .json();

    assert!(names(&body).is_empty());
    assert_eq!(body["meta"]["pagination"]["total"], json!(25));
    assert_eq!(body["meta"]["pagination"]["pageCount"], json!(3));
}

#[tokio::test]
async fn test_malformed_pagination_is_corrected() {
    let (router, state) = app(None).await;
    seed_conditions(&state, 3).await;
    let server = TestServer::new(router).unwrap();

    let body: Value = server
        .get("/api/conditions")
        .add_query_param("pagination[page]", "x")
        .add_query_param("pagination[pageSize]", "2abc")
        .await
        .json();

    assert_eq!(
        body["meta"]["pagination"],
        json!({ "page": 1, "pageSize": 2, "pageCount": 2, "total": 3 })
    );
}

#[tokio::test]
async fn test_missing_record_is_404() {
    let (router, _) = app(None).await;
    let server = TestServer::new(router).unwrap();

    let response = server.get("/api/conditions/999").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], json!("NOT_FOUND"));
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn test_unknown_resource_is_404() {
    let (router, _) = app(None).await;
    let server = TestServer::new(router).unwrap();

    assert_eq!(server.get("/api/users").await.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(server.get("/api/users/1").await.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_filter_active_ads() {
    let (router, state) = app(None).await;
    seed(&state, Resource::Ads, json!({ "name": "Bicicleta", "active": true })).await;
    seed(&state, Resource::Ads, json!({ "name": "Sofá", "active": false })).await;
    seed(&state, Resource::Ads, json!({ "name": "Guitarra", "active": true })).await;
    let server = TestServer::new(router).unwrap();

    let body: Value = server
        .get("/api/ads")
        .add_query_param("filters[active][$eq]", "true")
        .add_query_param("sort", "name:asc")
        .await
        .json();

    assert_eq!(names(&body), vec!["Bicicleta", "Guitarra"]);
    assert_eq!(body["meta"]["pagination"]["total"], json!(2));
}

#[tokio::test]
async fn test_search_and_or_filters() {
    let (router, state) = app(None).await;
    seed(&state, Resource::Ads, json!({ "name": "Bici de ruta", "price": 150000 })).await;
    seed(&state, Resource::Ads, json!({ "name": "Casco", "description": "para bici", "price": 20000 })).await;
    seed(&state, Resource::Ads, json!({ "name": "Mesa", "price": 30000 })).await;
    let server = TestServer::new(router).unwrap();

    let searched: Value = server
        .get("/api/ads")
        .add_query_param("search", "BICI")
        .add_query_param("sort", "price:desc")
        .await
        .json();
    assert_eq!(names(&searched), vec!["Bici de ruta", "Casco"]);

    let either: Value = server
        .get("/api/ads")
        .add_query_param("filters[$or][0][price][$lt]", 25000)
        .add_query_param("filters[$or][1][name][$eq]", "Mesa")
        .add_query_param("sort", "name:asc")
        .await
        .json();
    assert_eq!(names(&either), vec!["Casco", "Mesa"]);
}

#[tokio::test]
async fn test_unknown_operator_is_400() {
    let (router, _) = app(None).await;
    let server = TestServer::new(router).unwrap();

    let response = server
        .get("/api/ads")
        .add_query_param("filters[name][$regex]", "^bici")
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], json!("VALIDATION_ERROR"));
}

#[tokio::test]
async fn test_crud_with_slugs() {
    let (router, _) = app(None).await;
    let server = TestServer::new(router).unwrap();

    let created = server
        .post("/api/regions")
        .json(&json!({ "data": { "name": "Región Ñuble" } }))
        .await;
    assert_eq!(created.status_code(), StatusCode::CREATED);
    let region: Value = created.json();
    let id = region["data"]["id"].as_i64().unwrap();
    assert_eq!(region["data"]["slug"], json!("region-nuble"));

    let by_slug: Value = server.get("/api/regions/region-nuble").await.json();
    assert_eq!(by_slug["data"]["id"], json!(id));

    let updated: Value = server
        .put(&format!("/api/regions/{}", id))
        .json(&json!({ "data": { "name": "Región del Biobío" } }))
        .await
        .json();
    assert_eq!(updated["data"]["slug"], json!("region-del-biobio"));

    let deleted = server.delete(&format!("/api/regions/{}", id)).await;
    assert_eq!(deleted.status_code(), StatusCode::OK);
    assert_eq!(
        server.get(&format!("/api/regions/{}", id)).await.status_code(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_relations_are_populated() {
    let (router, state) = app(None).await;
    let region = seed(&state, Resource::Regions, json!({ "name": "Ñuble" })).await;
    let commune = seed(
        &state,
        Resource::Communes,
        json!({ "name": "Chillán", "region": region["id"] }),
    )
    .await;
    let server = TestServer::new(router).unwrap();

    let single: Value = server
        .get(&format!("/api/communes/{}", commune["id"]))
        .await
        .json();
    assert_eq!(single["data"]["region"]["name"], json!("Ñuble"));

    let plain: Value = server.get("/api/communes").await.json();
    assert_eq!(plain["data"][0]["region"], region["id"]);

    let populated: Value = server
        .get("/api/communes")
        .add_query_param("populate", "region")
        .await
        .json();
    assert_eq!(populated["data"][0]["region"]["name"], json!("Ñuble"));

    let by_region: Value = server
        .get("/api/communes")
        .add_query_param("filters[region][id][$eq]", region["id"].to_string())
        .await
        .json();
    assert_eq!(names(&by_region), vec!["Chillán"]);
}

#[tokio::test]
async fn test_writes_require_token_when_configured() {
    let (router, _) = app(Some("secret")).await;
    let server = TestServer::new(router).unwrap();
    let body = json!({ "data": { "name": "Nuevo" } });

    let anonymous = server.post("/api/conditions").json(&body).await;
    assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);

    let wrong = server
        .post("/api/conditions")
        .authorization_bearer("guess")
        .json(&body)
        .await;
    assert_eq!(wrong.status_code(), StatusCode::UNAUTHORIZED);

    let authorized = server
        .post("/api/conditions")
        .authorization_bearer("secret")
        .json(&body)
        .await;
    assert_eq!(authorized.status_code(), StatusCode::CREATED);

    assert_eq!(server.get("/api/conditions").await.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_health() {
    let (router, _) = app(None).await;
    let server = TestServer::new(router).unwrap();

    server.get("/api/conditions").await;
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["database"], json!("up"));
    assert!(body["total_requests"].as_u64().unwrap() >= 1);
}
