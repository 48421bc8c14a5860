// Body rejections use the JSON error envelope and the upload route accepts large files

mod common;

use axum::http::{header, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{setup_test_app, TestResponse};
use profitum_backend::models::auth::UserType;
use serde_json::{json, Value};

async fn assert_validation_envelope(response: TestResponse, context: &str) {
    assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", context);
    assert_eq!(
        response.header(header::CONTENT_TYPE).as_deref(),
        Some("application/json"),
        "{}",
        context
    );
    let body: Value = response.json().await;
    assert_eq!(body["success"], false, "{}", context);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR", "{}", context);
}

#[tokio::test]
async fn test_missing_field_on_public_routes_is_a_400() {
    let app = setup_test_app();

    let response = app.post("/api/auth/register").json(&json!({})).send().await;
    assert_validation_envelope(response, "register").await;

    let response = app.post("/api/simulator/response").json(&json!({})).send().await;
    assert_validation_envelope(response, "simulator response").await;
}

#[tokio::test]
async fn test_malformed_json_in_each_role_group_is_a_400() {
    let app = setup_test_app();

    let cases = [
        (UserType::Client, "PUT", "/api/client/profile"),
        (UserType::Expert, "PUT", "/api/expert/profile"),
        (UserType::Apporteur, "POST", "/api/apporteur/prospects"),
        (UserType::Admin, "POST", "/api/admin/clients"),
        (UserType::Client, "POST", "/api/dossiers"),
        (UserType::Client, "POST", "/api/rdv"),
    ];

    for (user_type, method, uri) in cases {
        let token = app.token_for(user_type);
        let request = match method {
            "PUT" => app.put(uri),
            _ => app.post(uri),
        };
        let response = request.bearer(&token).raw_json("{\"company_name\": ").send().await;
        assert_validation_envelope(response, uri).await;
    }
}

#[tokio::test]
async fn test_invalid_path_id_is_a_400() {
    let app = setup_test_app();
    let token = app.token_for(UserType::Admin);

    let response = app
        .get("/api/admin/clients/not-a-uuid")
        .bearer(&token)
        .send()
        .await;
    assert_validation_envelope(response, "path id").await;
}

#[tokio::test]
async fn test_multi_megabyte_upload_reaches_the_handler() {
    let app = setup_test_app();
    let token = app.token_for(UserType::Client);

    // 3 MiB is above axum's default cap but under MAX_UPLOAD_BYTES. The MIME
    // check fails before any database access, which proves the body was read.
    let content = STANDARD.encode(vec![7u8; 3 * 1024 * 1024]);
    let response = app
        .post("/api/documents")
        .bearer(&token)
        .json(&json!({
            "filename": "setup.exe",
            "mime_type": "application/x-msdownload",
            "content_base64": content,
        }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await;
    assert!(body["message"].as_str().unwrap_or_default().contains("not allowed"));
}

#[tokio::test]
async fn test_body_over_the_upload_cap_is_a_json_413() {
    let app = setup_test_app();
    let token = app.token_for(UserType::Client);

    let content = "A".repeat(16 * 1024 * 1024);
    let response = app
        .post("/api/documents")
        .bearer(&token)
        .json(&json!({
            "filename": "archive.pdf",
            "mime_type": "application/pdf",
            "content_base64": content,
        }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = response.json().await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
}
