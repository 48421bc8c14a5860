// Authentication endpoints that resolve before touching the database

mod common;

use axum::http::StatusCode;
use common::setup_test_app;
use profitum_backend::models::auth::UserType;
use serde_json::{json, Value};

#[tokio::test]
async fn test_login_rejects_malformed_email() {
    let app = setup_test_app();

    let response = app
        .post("/api/auth/client/login")
        .json(&json!({ "email": "not-an-email", "password": "secret" }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_login_rejects_unknown_account_type() {
    let app = setup_test_app();

    let response = app
        .post("/api/auth/partner/login")
        .json(&json!({ "email": "jean@profitum.fr", "password": "secret" }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await;
    assert!(body["message"]
        .as_str()
        .unwrap_or_default()
        .contains("partner"));
}

#[tokio::test]
async fn test_login_requires_password() {
    let app = setup_test_app();

    let response = app
        .post("/api/auth/login")
        .json(&json!({ "email": "jean@profitum.fr", "password": "", "type": "expert" }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_validates_siren_and_password() {
    let app = setup_test_app();

    let response = app
        .post("/api/auth/register")
        .json(&json!({
            "username": "Jean Dupont",
            "email": "jean@transports-dupont.fr",
            "password": "short",
            "company_name": "Transports Dupont",
            "phone_number": "0601020304",
            "siren": "12345",
            "address": "1 rue de la Paix",
            "city": "Paris",
            "postal_code": "75001"
        }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let app = setup_test_app();
    let access = app.token_for(UserType::Client);

    // Access and refresh tokens are signed with different secrets
    let response = app
        .post("/api/auth/refresh")
        .json(&json!({ "refresh_token": access }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = setup_test_app();

    let response = app.get("/api/auth/verify").send().await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_protected_route_rejects_garbage_token() {
    let app = setup_test_app();

    let response = app
        .get("/api/dossiers")
        .bearer("definitely.not.a-jwt")
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_verify_echoes_claims() {
    let app = setup_test_app();
    let token = app.token_for(UserType::Apporteur);

    let response = app.get("/api/auth/verify").bearer(&token).send().await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["type"], "apporteur");
    assert_eq!(body["data"]["email"], "tester@profitum.fr");
}
