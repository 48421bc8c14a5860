// Anonymous simulator session through to client account creation
// Run with: cargo test --test simulator_flow_test -- --ignored

mod common;

use axum::http::StatusCode;
use common::setup_db_test_app;
use serde_json::{json, Value};
use uuid::Uuid;

fn question_id(questions: &Value, code: &str) -> String {
    questions["data"]
        .as_array()
        .and_then(|qs| qs.iter().find(|q| q["code"] == code))
        .and_then(|q| q["id"].as_str())
        .map(String::from)
        .unwrap_or_else(|| panic!("seeded question {} missing", code))
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_session_answers_results_and_migration() {
    let app = setup_db_test_app().await;

    let response = app.post("/api/simulator/session").send().await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await;
    let token = created["data"]["session_token"].as_str().unwrap().to_string();

    let questions: Value = app.get("/api/simulator/questions").send().await.json().await;
    let answers = [
        ("secteur", json!("Transport routier de marchandises")),
        ("nombre_employes", json!("6 à 20")),
    ];
    for (code, value) in answers {
        let response = app
            .post("/api/simulator/response")
            .json(&json!({
                "session_token": token,
                "question_id": question_id(&questions, code),
                "response_value": value,
            }))
            .send()
            .await;
        assert_eq!(response.status(), StatusCode::OK, "answer {}", code);
    }

    let response = app
        .post("/api/simulator/calculate-eligibility")
        .json(&json!({ "session_token": token }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let results: Value = response.json().await;
    assert_eq!(results["data"]["completed"], true);
    assert!(!results["data"]["results"].as_array().unwrap().is_empty());

    let email = format!("flow-{}@transports-test.fr", Uuid::new_v4().simple());
    let response = app
        .post(&format!("/api/simulator/migrate/{}", token))
        .json(&json!({
            "email": email,
            "password": "Sup3rSecret!",
            "username": "Jean Flow",
            "company_name": "Transports Flow",
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let migrated: Value = response.json().await;
    assert_eq!(migrated["data"]["details"]["session_migrated"], true);

    let status: Value = app
        .get(&format!("/api/simulator/migrate/{}/status", token))
        .send()
        .await
        .json()
        .await;
    assert_eq!(status["data"]["migrated"], true);
    assert_eq!(status["data"]["client_id"], migrated["data"]["client_id"]);

    // A migrated session is read-only
    let response = app
        .post("/api/simulator/response")
        .json(&json!({
            "session_token": token,
            "question_id": question_id(&questions, "secteur"),
            "response_value": "Commerce",
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
