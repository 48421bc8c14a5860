// RDV (appointment) handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use uuid::Uuid;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        common::ApiResponse,
        rdv::{
            CreateRdvRequest, MarkCompletedRequest, RdvFilter, RdvResponseRequest,
            UpdateRdvRequest,
        },
    },
    services::rdv::RdvService,
    utils::extract::{ApiJson, ApiPath, ApiQuery},
};

/// `format=calendar` switches the items to CalendarEvent
#[utoipa::path(
    get,
    path = "/api/rdv",
    tag = "RDV",
    operation_id = "listRdvs",
    params(RdvFilter),
    responses((status = 200, description = "RDVs visible to the caller", body = crate::services::rdv::RdvListing)),
    security(("bearerAuth" = []))
)]
pub async fn list_rdvs(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiQuery(filter): ApiQuery<RdvFilter>,
) -> Response {
    match RdvService::new(&state).list(&user, &filter).await {
        Ok(listing) => Json(ApiResponse::ok(listing)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/rdv/pending/validation",
    tag = "RDV",
    operation_id = "pendingRdvValidation",
    responses(
        (status = 200, description = "Proposed RDVs awaiting the expert", body = [crate::models::rdv::Rdv]),
        (status = 403, description = "Caller is not an expert")
    ),
    security(("bearerAuth" = []))
)]
pub async fn pending_validation(State(state): State<AppState>, user: AuthenticatedUser) -> Response {
    match RdvService::new(&state).pending_validation(&user).await {
        Ok(rdvs) => Json(ApiResponse::ok(rdvs)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/rdv/{id}",
    tag = "RDV",
    operation_id = "getRdv",
    params(("id" = Uuid, Path, description = "RDV id")),
    responses(
        (status = 200, description = "RDV with linked products", body = crate::models::rdv::RdvDetail),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "RDV not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_rdv(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(rdv_id): ApiPath<Uuid>,
) -> Response {
    match RdvService::new(&state).get(&user, rdv_id).await {
        Ok(rdv) => Json(ApiResponse::ok(rdv)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/rdv",
    tag = "RDV",
    operation_id = "createRdv",
    request_body = CreateRdvRequest,
    responses(
        (status = 201, description = "RDV created", body = crate::models::rdv::RdvDetail),
        (status = 400, description = "Invalid slot or participants")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_rdv(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<CreateRdvRequest>,
) -> Response {
    match RdvService::new(&state).create(&user, request).await {
        Ok(rdv) => (StatusCode::CREATED, Json(ApiResponse::ok(rdv))).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/rdv/{id}",
    tag = "RDV",
    operation_id = "updateRdv",
    params(("id" = Uuid, Path, description = "RDV id")),
    request_body = UpdateRdvRequest,
    responses((status = 200, description = "RDV updated", body = crate::models::rdv::Rdv)),
    security(("bearerAuth" = []))
)]
pub async fn update_rdv(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(rdv_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateRdvRequest>,
) -> Response {
    match RdvService::new(&state).update(&user, rdv_id, request).await {
        Ok(rdv) => Json(ApiResponse::ok(rdv)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/rdv/{id}/validate",
    tag = "RDV",
    operation_id = "validateRdv",
    params(("id" = Uuid, Path, description = "RDV id")),
    request_body = RdvResponseRequest,
    responses(
        (status = 200, description = "RDV accepted or alternative proposed", body = crate::models::rdv::Rdv),
        (status = 403, description = "Caller is not the RDV's expert")
    ),
    security(("bearerAuth" = []))
)]
pub async fn validate_rdv(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(rdv_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<RdvResponseRequest>,
) -> Response {
    match RdvService::new(&state).validate(&user, rdv_id, request).await {
        Ok(rdv) => Json(ApiResponse::ok(rdv)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/rdv/{id}/respond",
    tag = "RDV",
    operation_id = "respondRdv",
    params(("id" = Uuid, Path, description = "RDV id")),
    request_body = RdvResponseRequest,
    responses((status = 200, description = "Response recorded", body = crate::models::rdv::Rdv)),
    security(("bearerAuth" = []))
)]
pub async fn respond_rdv(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(rdv_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<RdvResponseRequest>,
) -> Response {
    match RdvService::new(&state).respond(&user, rdv_id, request).await {
        Ok(rdv) => Json(ApiResponse::ok(rdv)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/rdv/{id}/mark-completed",
    tag = "RDV",
    operation_id = "markRdvCompleted",
    params(("id" = Uuid, Path, description = "RDV id")),
    request_body = MarkCompletedRequest,
    responses((status = 200, description = "RDV closed", body = crate::models::rdv::Rdv)),
    security(("bearerAuth" = []))
)]
pub async fn mark_completed(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(rdv_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<MarkCompletedRequest>,
) -> Response {
    match RdvService::new(&state)
        .mark_completed(&user, rdv_id, request)
        .await
    {
        Ok(rdv) => Json(ApiResponse::ok(rdv)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/rdv/{id}",
    tag = "RDV",
    operation_id = "deleteRdv",
    params(("id" = Uuid, Path, description = "RDV id")),
    responses(
        (status = 200, description = "RDV deleted"),
        (status = 403, description = "Only the creator or an admin may delete")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_rdv(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(rdv_id): ApiPath<Uuid>,
) -> Response {
    match RdvService::new(&state).delete(&user, rdv_id).await {
        Ok(()) => Json(ApiResponse::message("RDV deleted")).into_response(),
        Err(e) => e.into_response(),
    }
}
