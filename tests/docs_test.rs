// OpenAPI document and Swagger UI page

mod common;

use axum::http::{header, StatusCode};
use common::setup_test_app;
use serde_json::Value;

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = setup_test_app();

    let response = app.get("/api/docs/openapi.json").send().await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.header(header::CONTENT_TYPE).as_deref(),
        Some("application/json")
    );

    let spec: Value = response.json().await;
    assert_eq!(spec["info"]["title"], "Profitum API");
    assert!(spec["paths"]["/api/simulator/session"].is_object());
    assert!(spec["paths"]["/api/admin/experts/{id}/approve"].is_object());
    assert!(spec["paths"]["/api/dossiers/{id}/timeline"]["post"].is_object());
    assert!(spec["components"]["schemas"]["TimelinePage"].is_object());
    assert!(spec["components"]["securitySchemes"]["bearerAuth"].is_object());
    assert!(spec["servers"][0]["url"]
        .as_str()
        .unwrap_or_default()
        .starts_with("http://localhost:"));
}

#[tokio::test]
async fn test_swagger_ui_page_points_at_document() {
    let app = setup_test_app();

    let response = app.get("/api/docs").send().await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = response.text().await;
    assert!(html.contains("/api/docs/openapi.json"));
}

#[tokio::test]
async fn test_docs_trailing_slash_redirects() {
    let app = setup_test_app();

    let response = app.get("/api/docs/").send().await;

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.header(header::LOCATION).as_deref(), Some("/api/docs"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = setup_test_app();

    let response = app.get("/api/links").send().await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
