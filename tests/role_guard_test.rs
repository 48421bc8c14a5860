// Each route group only admits its own account type

mod common;

use axum::http::StatusCode;
use common::setup_test_app;
use profitum_backend::models::auth::UserType;
use serde_json::Value;

#[tokio::test]
async fn test_client_token_cannot_reach_admin_routes() {
    let app = setup_test_app();
    let token = app.token_for(UserType::Client);

    for uri in [
        "/api/admin/dashboard",
        "/api/admin/clients",
        "/api/admin/experts/stats",
        "/api/simulator/stats",
    ] {
        let response = app.get(uri).bearer(&token).send().await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
    }
}

#[tokio::test]
async fn test_forbidden_body_names_account_type() {
    let app = setup_test_app();
    let token = app.token_for(UserType::Expert);

    let response = app.get("/api/admin/dashboard").bearer(&token).send().await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
    assert!(body["message"].as_str().unwrap_or_default().contains("expert"));
}

#[tokio::test]
async fn test_self_service_routes_are_role_scoped() {
    let app = setup_test_app();

    let expert = app.token_for(UserType::Expert);
    let response = app.get("/api/client/profile").bearer(&expert).send().await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let apporteur = app.token_for(UserType::Apporteur);
    let response = app.get("/api/expert/profile").bearer(&apporteur).send().await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let client = app.token_for(UserType::Client);
    let response = app.get("/api/apporteur/prospects").bearer(&client).send().await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin = app.token_for(UserType::Admin);
    let response = app.post("/api/simulations").bearer(&admin).send().await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_rdv_validation_is_expert_only() {
    let app = setup_test_app();
    let client = app.token_for(UserType::Client);

    let response = app
        .get("/api/rdv/pending/validation")
        .bearer(&client)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .put("/api/rdv/00000000-0000-0000-0000-000000000001/validate")
        .bearer(&client)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_role_guard_runs_after_authentication() {
    let app = setup_test_app();

    let response = app.get("/api/admin/dashboard").send().await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_dossier_comments_are_internal() {
    let app = setup_test_app();
    let client = app.token_for(UserType::Client);
    let uri = format!("/api/dossiers/{}/comments", uuid::Uuid::new_v4());

    let response = app.get(&uri).bearer(&client).send().await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post(&uri)
        .bearer(&client)
        .json(&serde_json::json!({ "content": "Bonjour" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_only_admins_delete_timeline_events() {
    let app = setup_test_app();
    let uri = format!(
        "/api/dossiers/{}/timeline/{}",
        uuid::Uuid::new_v4(),
        uuid::Uuid::new_v4()
    );

    for user_type in [UserType::Expert, UserType::Client, UserType::Apporteur] {
        let token = app.token_for(user_type);
        let response = app.delete(&uri).bearer(&token).send().await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{:?}", user_type);
    }
}
