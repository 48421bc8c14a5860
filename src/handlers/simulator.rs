// Anonymous eligibility simulator and registered-client simulations

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Extension, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use axum_extra::{headers::UserAgent, TypedHeader};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        common::ApiResponse,
        simulation::{
            MigrateSessionRequest, RunSimulationRequest, SaveResponseRequest,
            SessionReferenceRequest,
        },
    },
    services::{
        session_migration::SessionMigrationService,
        simulator::SimulatorService,
    },
    utils::{
        extract::{ApiJson, ApiPath},
        service_error::ServiceError,
    },
};

/// First `X-Forwarded-For` hop, else the socket peer
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

#[utoipa::path(
    post,
    path = "/api/simulator/session",
    tag = "Simulator",
    operation_id = "createSimulatorSession",
    responses((status = 201, description = "Anonymous session", body = crate::models::simulation::SessionCreated))
)]
pub async fn create_session(
    State(state): State<AppState>,
    connect_info: Option<Extension<ConnectInfo<SocketAddr>>>,
    user_agent: Option<TypedHeader<UserAgent>>,
    headers: HeaderMap,
) -> Response {
    let peer = connect_info.map(|Extension(ConnectInfo(addr))| addr);
    let ip_address = client_ip(&headers, peer);
    let user_agent = user_agent.map(|TypedHeader(ua)| ua.to_string());

    match SimulatorService::new(&state)
        .create_session(ip_address, user_agent)
        .await
    {
        Ok(session) => (StatusCode::CREATED, Json(ApiResponse::ok(session))).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/simulator/questions",
    tag = "Simulator",
    operation_id = "simulatorQuestions",
    responses((status = 200, description = "Ordered questionnaire", body = [crate::models::simulation::QuestionnaireQuestion]))
)]
pub async fn questions(State(state): State<AppState>) -> Response {
    match SimulatorService::new(&state).questions().await {
        Ok(questions) => Json(ApiResponse::ok(questions)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/simulator/response",
    tag = "Simulator",
    operation_id = "saveSimulatorResponse",
    request_body = SaveResponseRequest,
    responses(
        (status = 200, description = "Answer saved", body = crate::models::simulation::TemporaryResponse),
        (status = 400, description = "Session expired, abandoned or migrated")
    )
)]
pub async fn save_response(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SaveResponseRequest>,
) -> Response {
    match SimulatorService::new(&state).save_response(request).await {
        Ok(response) => Json(ApiResponse::ok(response)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/simulator/calculate-eligibility",
    tag = "Simulator",
    operation_id = "calculateEligibility",
    request_body = SessionReferenceRequest,
    responses(
        (status = 200, description = "Per-product results", body = crate::models::simulation::EligibilityResults),
        (status = 404, description = "Session not found")
    )
)]
pub async fn calculate_eligibility(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SessionReferenceRequest>,
) -> Response {
    if let Err(e) = request.validate() {
        return ServiceError::from(e).into_response();
    }
    match SimulatorService::new(&state)
        .calculate(&request.session_id)
        .await
    {
        Ok(results) => Json(ApiResponse::ok(results)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/simulator/results/{session_id}",
    tag = "Simulator",
    operation_id = "simulatorResultsById",
    params(("session_id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "Stored results", body = crate::models::simulation::EligibilityResults))
)]
pub async fn results_by_id(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<Uuid>,
) -> Response {
    match SimulatorService::new(&state).results_by_id(session_id).await {
        Ok(results) => Json(ApiResponse::ok(results)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/simulator/results/session/{token}",
    tag = "Simulator",
    operation_id = "simulatorResultsByToken",
    params(("token" = String, Path, description = "Session token")),
    responses((status = 200, description = "Stored results", body = crate::models::simulation::EligibilityResults))
)]
pub async fn results_by_token(
    State(state): State<AppState>,
    ApiPath(token): ApiPath<String>,
) -> Response {
    match SimulatorService::new(&state).results_by_token(&token).await {
        Ok(results) => Json(ApiResponse::ok(results)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/simulator/abandon",
    tag = "Simulator",
    operation_id = "abandonSimulatorSession",
    request_body = SessionReferenceRequest,
    responses((status = 200, description = "Session abandoned"))
)]
pub async fn abandon(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SessionReferenceRequest>,
) -> Response {
    if let Err(e) = request.validate() {
        return ServiceError::from(e).into_response();
    }
    match SimulatorService::new(&state).abandon(&request.session_id).await {
        Ok(()) => Json(ApiResponse::message("Session abandoned")).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Turns a completed anonymous session into a client account
#[utoipa::path(
    post,
    path = "/api/simulator/migrate/{session_token}",
    tag = "Simulator",
    operation_id = "migrateSimulatorSession",
    params(("session_token" = String, Path, description = "Session token")),
    request_body = MigrateSessionRequest,
    responses(
        (status = 201, description = "Client created from the session", body = crate::models::simulation::MigrationResult),
        (status = 400, description = "Session cannot be migrated"),
        (status = 409, description = "Email already registered or session already migrated")
    )
)]
pub async fn migrate_session(
    State(state): State<AppState>,
    ApiPath(session_token): ApiPath<String>,
    ApiJson(request): ApiJson<MigrateSessionRequest>,
) -> Response {
    match SessionMigrationService::new(&state)
        .migrate(&session_token, request)
        .await
    {
        Ok(result) => (
            StatusCode::CREATED,
            Json(ApiResponse::with_message(result, "Account created from simulation")),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/simulator/migrate/{session_token}/status",
    tag = "Simulator",
    operation_id = "simulatorMigrationStatus",
    params(("session_token" = String, Path, description = "Session token")),
    responses((status = 200, description = "`{ migrated, client_id }`"))
)]
pub async fn migration_status(
    State(state): State<AppState>,
    ApiPath(session_token): ApiPath<String>,
) -> Response {
    match SessionMigrationService::new(&state)
        .migrated_client(&session_token)
        .await
    {
        Ok(client_id) => Json(ApiResponse::ok(json!({
            "migrated": client_id.is_some(),
            "client_id": client_id,
        })))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/simulator/stats",
    tag = "Admin",
    operation_id = "simulatorStats",
    responses((status = 200, description = "Session funnel", body = crate::models::simulation::SimulatorStats)),
    security(("bearerAuth" = []))
)]
pub async fn stats(State(state): State<AppState>) -> Response {
    match SimulatorService::new(&state).stats().await {
        Ok(stats) => Json(ApiResponse::ok(stats)).into_response(),
        Err(e) => e.into_response(),
    }
}

// =============================================================================
// REGISTERED CLIENTS
// =============================================================================

#[utoipa::path(
    post,
    path = "/api/simulations",
    tag = "Simulator",
    operation_id = "runClientSimulation",
    request_body = RunSimulationRequest,
    responses((status = 201, description = "Simulation saved, dossiers opened", body = crate::services::simulator::SimulationOutcome)),
    security(("bearerAuth" = []))
)]
pub async fn run_for_self(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<RunSimulationRequest>,
) -> Response {
    match SimulatorService::new(&state).run_for_self(&user, request).await {
        Ok(outcome) => (StatusCode::CREATED, Json(ApiResponse::ok(outcome))).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/clients/{id}/simulation",
    tag = "Admin",
    operation_id = "runSimulationForClient",
    params(("id" = Uuid, Path, description = "Client id")),
    request_body = RunSimulationRequest,
    responses((status = 201, description = "Simulation saved, dossiers opened", body = crate::services::simulator::SimulationOutcome)),
    security(("bearerAuth" = []))
)]
pub async fn run_on_behalf(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(client_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<RunSimulationRequest>,
) -> Response {
    match SimulatorService::new(&state)
        .run_on_behalf(&user, client_id, request)
        .await
    {
        Ok(outcome) => (StatusCode::CREATED, Json(ApiResponse::ok(outcome))).into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer)).as_deref(), Some("10.0.0.1"));

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers, Some(peer)).as_deref(), Some("203.0.113.7"));
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }
}
