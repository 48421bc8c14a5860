// End-to-end flows against PostgreSQL
// Run with: TEST_DATABASE_URL=... cargo test --test database_flows_test -- --ignored

mod common;

use axum::http::StatusCode;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Duration, Utc};
use common::{setup_db_test_app, unique_email, unique_siren, TestApp};
use profitum_backend::models::{
    auth::UserType,
    dossier::{ClientProduitEligible, DossierUpdate},
    status::DossierStatut,
};
use serde_json::{json, Value};
use serial_test::serial;
use uuid::Uuid;

const PASSWORD: &str = "Sup3rSecret!";

struct Account {
    id: Uuid,
    email: String,
    token: String,
}

fn id_of(body: &Value, pointer: &str) -> Uuid {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("no uuid at {} in {}", pointer, body))
}

async fn register_client(app: &TestApp, email: &str) -> Account {
    let response = app
        .post("/api/auth/register")
        .json(&json!({
            "username": "Jean Test",
            "email": email,
            "password": PASSWORD,
            "company_name": "Transports Test",
            "phone_number": "0601020304",
            "siren": unique_siren(),
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED, "register {}", email);
    let body: Value = response.json().await;
    Account {
        id: id_of(&body, "/data/user/id"),
        email: email.to_string(),
        token: body["data"]["token"].as_str().unwrap().to_string(),
    }
}

async fn create_expert(app: &TestApp, admin: &str) -> Account {
    let email = unique_email("expert");
    let response = app
        .post("/api/admin/experts")
        .bearer(admin)
        .json(&json!({
            "email": email,
            "password": PASSWORD,
            "name": "Claire Expert",
            "specializations": ["TICPE"],
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await;
    let id = id_of(&body, "/data/id");
    Account {
        token: app.token_as(id, &email, UserType::Expert),
        id,
        email,
    }
}

async fn create_apporteur(app: &TestApp, admin: &str) -> Account {
    let email = unique_email("apporteur");
    let response = app
        .post("/api/admin/apporteurs")
        .bearer(admin)
        .json(&json!({
            "email": email,
            "password": PASSWORD,
            "first_name": "Paul",
            "last_name": "Apporteur",
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await;
    let id = id_of(&body, "/data/id");
    Account {
        token: app.token_as(id, &email, UserType::Apporteur),
        id,
        email,
    }
}

async fn produit_id(app: &TestApp, code: &str) -> Uuid {
    let body: Value = app.get("/api/produits").send().await.json().await;
    body["data"]
        .as_array()
        .and_then(|ps| ps.iter().find(|p| p["code"] == code))
        .and_then(|p| p["id"].as_str())
        .and_then(|id| id.parse().ok())
        .unwrap_or_else(|| panic!("seeded product {} missing", code))
}

async fn answered_session(app: &TestApp) -> String {
    let created: Value = app.post("/api/simulator/session").send().await.json().await;
    let token = created["data"]["session_token"].as_str().unwrap().to_string();

    let questions: Value = app.get("/api/simulator/questions").send().await.json().await;
    for (code, value) in [
        ("secteur", json!("Transport routier de marchandises")),
        ("nombre_employes", json!("6 à 20")),
    ] {
        let question_id = questions["data"]
            .as_array()
            .and_then(|qs| qs.iter().find(|q| q["code"] == code))
            .and_then(|q| q["id"].as_str())
            .unwrap()
            .to_string();
        let response = app
            .post("/api/simulator/response")
            .json(&json!({
                "session_token": token,
                "question_id": question_id,
                "response_value": value,
            }))
            .send()
            .await;
        assert_eq!(response.status(), StatusCode::OK, "answer {}", code);
    }
    token
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_session_is_found_by_its_token() {
    let app = setup_db_test_app().await;
    let token = answered_session(&app).await;

    let response = app
        .post("/api/simulator/calculate-eligibility")
        .json(&json!({ "session_token": token }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .get(&format!("/api/simulator/results/session/{}", token))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post("/api/simulator/abandon")
        .json(&json!({ "session_token": token }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_email_lookup_treats_wildcards_literally() {
    let app = setup_db_test_app().await;
    let suffix = Uuid::new_v4().simple().to_string();

    register_client(&app, &format!("axb-{}@profitum-test.fr", suffix)).await;
    register_client(&app, &format!("a_b-{}@profitum-test.fr", suffix)).await;

    let response = app
        .post("/api/auth/client/login")
        .json(&json!({ "email": format!("a%-{}@profitum-test.fr", suffix), "password": PASSWORD }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Case-insensitive match still applies
    let response = app
        .post("/api/auth/client/login")
        .json(&json!({ "email": format!("A_B-{}@PROFITUM-TEST.FR", suffix), "password": PASSWORD }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_login_with_wrong_account_type_is_invalid_credentials() {
    let app = setup_db_test_app().await;
    let client = register_client(&app, &unique_email("typed")).await;

    let response = app
        .post("/api/auth/expert/login")
        .json(&json!({ "email": client.email, "password": PASSWORD }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await;
    assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_migration_opens_a_dossier_per_result_and_survives_conflicts() {
    let app = setup_db_test_app().await;
    let token = answered_session(&app).await;
    let results: Value = app
        .post("/api/simulator/calculate-eligibility")
        .json(&json!({ "session_token": token }))
        .send()
        .await
        .json()
        .await;
    let results = results["data"]["results"].as_array().cloned().unwrap();

    // An email conflict rolls nothing forward; the session stays migratable
    let taken = register_client(&app, &unique_email("taken")).await;
    let response = app
        .post(&format!("/api/simulator/migrate/{}", token))
        .json(&json!({
            "email": taken.email,
            "password": PASSWORD,
            "username": "Jean Conflit",
            "company_name": "Transports Conflit",
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let status: Value = app
        .get(&format!("/api/simulator/migrate/{}/status", token))
        .send()
        .await
        .json()
        .await;
    assert_eq!(status["data"]["migrated"], false);

    let response = app
        .post(&format!("/api/simulator/migrate/{}", token))
        .json(&json!({
            "email": unique_email("migrated"),
            "password": PASSWORD,
            "username": "Jean Migré",
            "company_name": "Transports Migrés",
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let migrated: Value = response.json().await;
    let client_token = migrated["data"]["token"].as_str().unwrap().to_string();

    let dossiers: Value = app
        .get("/api/dossiers?limit=100")
        .bearer(&client_token)
        .send()
        .await
        .json()
        .await;
    let dossiers = dossiers["data"]["items"].as_array().cloned().unwrap();
    assert_eq!(dossiers.len(), results.len());

    for result in &results {
        let dossier = dossiers
            .iter()
            .find(|d| d["produit"]["code"] == result["produit_code"])
            .unwrap_or_else(|| panic!("no dossier for {}", result["produit_code"]));
        let expected = if result["eligibility_score"].as_i64().unwrap_or(0) >= 70 {
            "eligible"
        } else {
            "en_cours"
        };
        assert_eq!(dossier["statut"], expected, "{}", result["produit_code"]);
    }

    let first = id_of(&dossiers[0], "/id");
    let steps: Value = app
        .get(&format!("/api/dossiers/{}/steps", first))
        .bearer(&client_token)
        .send()
        .await
        .json()
        .await;
    assert_eq!(steps["data"].as_array().map(Vec::len), Some(5));

    let timeline: Value = app
        .get(&format!("/api/dossiers/{}/timeline", first))
        .bearer(&client_token)
        .send()
        .await
        .json()
        .await;
    assert_eq!(timeline["data"]["events"][0]["event_type"], "dossier_created");
    assert_eq!(timeline["data"]["events"][0]["actor_type"], "system");
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_dossier_lifecycle_with_steps_timeline_and_comments() {
    let app = setup_db_test_app().await;
    let admin = app.token_for(UserType::Admin);
    let client = register_client(&app, &unique_email("dossier")).await;
    let expert = create_expert(&app, &admin).await;
    let outsider = create_expert(&app, &admin).await;
    let ticpe = produit_id(&app, "TICPE").await;

    let response = app
        .post("/api/dossiers")
        .bearer(&client.token)
        .json(&json!({ "produit_id": ticpe }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let dossier_id = id_of(&response.json::<Value>().await, "/data/id");

    let response = app
        .post("/api/dossiers")
        .bearer(&client.token)
        .json(&json!({ "produit_id": ticpe }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Preferences silence the status-change notification
    let response = app
        .put("/api/notifications/preferences")
        .bearer(&client.token)
        .json(&json!({ "disabled_types": ["dossier_status_changed"] }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .put(&format!("/api/dossiers/{}/assign-expert", dossier_id))
        .bearer(&client.token)
        .json(&json!({ "expert_id": expert.id }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .put(&format!("/api/dossiers/{}/status", dossier_id))
        .bearer(&outsider.token)
        .json(&json!({ "statut": "en_cours" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .put(&format!("/api/dossiers/{}/status", dossier_id))
        .bearer(&expert.token)
        .json(&json!({ "statut": "en_cours" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .put(&format!("/api/dossiers/{}/status", dossier_id))
        .bearer(&expert.token)
        .json(&json!({ "statut": "eligible" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // A writer still expecting the old statut loses
    {
        let mut conn = app.state.diesel_pool.get().await.unwrap();
        let stale = ClientProduitEligible::update_if_statut(
            &mut conn,
            dossier_id,
            DossierStatut::Eligible,
            DossierUpdate::status(DossierStatut::Annule, None),
        )
        .await
        .unwrap();
        assert!(stale.is_none());
    }

    let notifications: Value = app
        .get("/api/notifications")
        .bearer(&client.token)
        .send()
        .await
        .json()
        .await;
    assert!(notifications["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .all(|n| n["notification_type"] != "dossier_status_changed"));

    let expert_notifications: Value = app
        .get("/api/notifications")
        .bearer(&expert.token)
        .send()
        .await
        .json()
        .await;
    assert!(expert_notifications["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .any(|n| n["notification_type"] == "dossier_assigned"));

    // Steps drive the dossier's progress
    let steps: Value = app
        .get(&format!("/api/dossiers/{}/steps", dossier_id))
        .bearer(&client.token)
        .send()
        .await
        .json()
        .await;
    let first_step = id_of(&steps["data"][0], "/id");
    let response = app
        .put(&format!("/api/dossiers/{}/steps/{}", dossier_id, first_step))
        .bearer(&expert.token)
        .json(&json!({ "status": "completed" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let step: Value = response.json().await;
    assert_eq!(step["data"]["progress"], 100);

    let dossier: Value = app
        .get(&format!("/api/dossiers/{}", dossier_id))
        .bearer(&client.token)
        .send()
        .await
        .json()
        .await;
    assert_eq!(dossier["data"]["current_step"], 1);
    assert_eq!(dossier["data"]["progress"], 20);

    let response = app
        .put(&format!("/api/dossiers/{}/steps/{}", dossier_id, Uuid::new_v4()))
        .bearer(&expert.token)
        .json(&json!({ "progress": 10 }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Timeline
    let response = app
        .post(&format!("/api/dossiers/{}/timeline", dossier_id))
        .bearer(&expert.token)
        .json(&json!({ "title": "Appel client", "description": "Pièces demandées" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let manual_event = id_of(&response.json::<Value>().await, "/data/id");

    let response = app
        .post(&format!("/api/dossiers/{}/timeline", dossier_id))
        .bearer(&client.token)
        .json(&json!({ "title": "Pas autorisé" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let timeline: Value = app
        .get(&format!("/api/dossiers/{}/timeline?limit=2", dossier_id))
        .bearer(&client.token)
        .send()
        .await
        .json()
        .await;
    assert_eq!(timeline["data"]["limit"], 2);
    assert_eq!(timeline["data"]["events"].as_array().map(Vec::len), Some(2));
    assert_eq!(timeline["data"]["total"], 5);

    let filtered: Value = app
        .get(&format!("/api/dossiers/{}/timeline?type=status_changed", dossier_id))
        .bearer(&client.token)
        .send()
        .await
        .json()
        .await;
    assert_eq!(filtered["data"]["total"], 1);

    let uri = format!("/api/dossiers/{}/timeline/{}", dossier_id, manual_event);
    assert_eq!(app.delete(&uri).bearer(&admin).send().await.status(), StatusCode::OK);
    assert_eq!(app.delete(&uri).bearer(&admin).send().await.status(), StatusCode::NOT_FOUND);

    // Comments
    let response = app
        .post(&format!("/api/dossiers/{}/comments", dossier_id))
        .bearer(&expert.token)
        .json(&json!({
            "content": "Factures carburant manquantes",
            "category": "document",
            "visible_to_apporteur": false,
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let comment_id = id_of(&response.json::<Value>().await, "/data/id");

    let comments_uri = format!("/api/dossiers/{}/comments", dossier_id);
    let response = app.get(&comments_uri).bearer(&client.token).send().await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = app.get(&comments_uri).bearer(&outsider.token).send().await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let comment_uri = format!("{}/{}", comments_uri, comment_id);
    let response = app
        .put(&comment_uri)
        .bearer(&outsider.token)
        .json(&json!({ "content": "Réécrit" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = app
        .put(&comment_uri)
        .bearer(&expert.token)
        .json(&json!({ "content": "Factures de janvier manquantes" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let listed: Value = app.get(&comments_uri).bearer(&admin).send().await.json().await;
    assert_eq!(listed["data"][0]["content"], "Factures de janvier manquantes");

    assert_eq!(app.delete(&comment_uri).bearer(&admin).send().await.status(), StatusCode::OK);
    let listed: Value = app.get(&comments_uri).bearer(&admin).send().await.json().await;
    assert_eq!(listed["data"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_rdv_validation_response_and_closing() {
    let app = setup_db_test_app().await;
    let admin = app.token_for(UserType::Admin);
    let client = register_client(&app, &unique_email("rdv")).await;
    let expert = create_expert(&app, &admin).await;
    let date = (Utc::now() + Duration::days(7)).date_naive();

    let response = app
        .post("/api/rdv")
        .bearer(&client.token)
        .json(&json!({
            "expert_id": expert.id,
            "scheduled_date": date,
            "scheduled_time": "10:00",
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await;
    assert_eq!(created["data"]["status"], "proposed");
    let rdv_id = id_of(&created, "/data/id");

    let response = app
        .put(&format!("/api/rdv/{}/validate", rdv_id))
        .bearer(&expert.token)
        .json(&json!({ "action": "accept" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let validated: Value = response.json().await;
    assert_eq!(validated["data"]["status"], "confirmed");

    let close_uri = format!("/api/rdv/{}/mark-completed", rdv_id);
    let response = app
        .post(&close_uri)
        .bearer(&client.token)
        .json(&json!({ "completed": true }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app
        .post(&close_uri)
        .bearer(&client.token)
        .json(&json!({ "completed": false }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Counter-proposal accepted by the client moves the slot
    let response = app
        .post("/api/rdv")
        .bearer(&client.token)
        .json(&json!({
            "expert_id": expert.id,
            "scheduled_date": date,
            "scheduled_time": "11:00",
        }))
        .send()
        .await;
    let second = id_of(&response.json::<Value>().await, "/data/id");

    let response = app
        .put(&format!("/api/rdv/{}/validate", second))
        .bearer(&expert.token)
        .json(&json!({
            "action": "propose_alternative",
            "alternative_date": date,
            "alternative_time": "14:30",
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .put(&format!("/api/rdv/{}/respond", second))
        .bearer(&client.token)
        .json(&json!({ "action": "accept" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let accepted: Value = response.json().await;
    assert_eq!(accepted["data"]["status"], "confirmed");
    assert!(accepted["data"]["scheduled_time"]
        .as_str()
        .unwrap_or_default()
        .starts_with("14:30"));
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_multi_megabyte_document_round_trip() {
    let app = setup_db_test_app().await;
    let client = register_client(&app, &unique_email("docs")).await;

    let content: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let response = app
        .post("/api/documents")
        .bearer(&client.token)
        .json(&json!({
            "filename": "factures-2024.pdf",
            "mime_type": "application/pdf",
            "content_base64": STANDARD.encode(&content),
            "category": "facture",
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let uploaded: Value = response.json().await;
    assert_eq!(uploaded["data"]["file_size"], content.len());
    let document_id = id_of(&uploaded, "/data/id");

    let response = app
        .get(&format!("/api/documents/{}/download", document_id))
        .bearer(&client.token)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.bytes().await, content);

    // Another client cannot read it
    let other = register_client(&app, &unique_email("docs-other")).await;
    let response = app
        .get(&format!("/api/documents/{}/download", document_id))
        .bearer(&other.token)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let too_big = STANDARD.encode(vec![1u8; 10 * 1024 * 1024 + 1]);
    let response = app
        .post("/api/documents")
        .bearer(&client.token)
        .json(&json!({
            "filename": "trop-gros.pdf",
            "mime_type": "application/pdf",
            "content_base64": too_big,
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_apporteur_only_reaches_own_prospects() {
    let app = setup_db_test_app().await;
    let admin = app.token_for(UserType::Admin);
    let owner = create_apporteur(&app, &admin).await;
    let rival = create_apporteur(&app, &admin).await;

    let response = app
        .post("/api/apporteur/prospects")
        .bearer(&owner.token)
        .json(&json!({
            "email": unique_email("prospect"),
            "username": "Marie Prospect",
            "company_name": "Logistique Prospect",
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let prospect_id = id_of(&response.json::<Value>().await, "/data/id");

    let uri = format!("/api/apporteur/prospects/{}", prospect_id);
    assert_eq!(app.get(&uri).bearer(&owner.token).send().await.status(), StatusCode::OK);
    assert_eq!(app.get(&uri).bearer(&rival.token).send().await.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        app.delete(&uri).bearer(&rival.token).send().await.status(),
        StatusCode::FORBIDDEN
    );

    let listed: Value = app
        .get("/api/apporteur/prospects")
        .bearer(&rival.token)
        .send()
        .await
        .json()
        .await;
    assert!(listed["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .all(|p| p["apporteur_id"] == json!(rival.id)));
}
