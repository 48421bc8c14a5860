// Dossier (ClientProduitEligible) handlers

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
        common::{ApiResponse, PaginationQuery},
        dossier::{
            AssignExpertRequest, CreateDossierRequest, DossierFilter, UpdateDossierProgressRequest,
            UpdateDossierStatusRequest,
        },
    },
    services::dossier::DossierService,
    utils::extract::{ApiJson, ApiPath, ApiQuery},
};

/// Scoped to the caller: own, assigned, referred or all
#[utoipa::path(
    get,
    path = "/api/dossiers",
    tag = "Dossiers",
    operation_id = "listDossiers",
    params(DossierFilter, PaginationQuery),
    responses((status = 200, description = "Paginated dossiers visible to the caller")),
    security(("bearerAuth" = []))
)]
pub async fn list_dossiers(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiQuery(filter): ApiQuery<DossierFilter>,
    ApiQuery(page): ApiQuery<PaginationQuery>,
) -> Response {
    match DossierService::new(&state).list(&user, &filter, &page).await {
        Ok(dossiers) => Json(ApiResponse::ok(dossiers)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/dossiers/{id}",
    tag = "Dossiers",
    operation_id = "getDossier",
    params(("id" = Uuid, Path, description = "Dossier id")),
    responses(
        (status = 200, description = "Dossier with product", body = crate::models::dossier::DossierView),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "Dossier not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_dossier(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(dossier_id): ApiPath<Uuid>,
) -> Response {
    match DossierService::new(&state).get(&user, dossier_id).await {
        Ok(dossier) => Json(ApiResponse::ok(dossier)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/dossiers",
    tag = "Dossiers",
    operation_id = "createDossier",
    request_body = CreateDossierRequest,
    responses(
        (status = 201, description = "Dossier opened", body = crate::models::dossier::ClientProduitEligible),
        (status = 409, description = "Client already has a dossier for this product")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_dossier(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<CreateDossierRequest>,
) -> Response {
    match DossierService::new(&state).create(&user, request).await {
        Ok(dossier) => (StatusCode::CREATED, Json(ApiResponse::ok(dossier))).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/dossiers/{id}/status",
    tag = "Dossiers",
    operation_id = "updateDossierStatus",
    params(("id" = Uuid, Path, description = "Dossier id")),
    request_body = UpdateDossierStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = crate::models::dossier::ClientProduitEligible),
        (status = 400, description = "Transition not allowed")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_dossier_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(dossier_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateDossierStatusRequest>,
) -> Response {
    match DossierService::new(&state)
        .update_status(&user, dossier_id, request)
        .await
    {
        Ok(dossier) => Json(ApiResponse::ok(dossier)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/dossiers/{id}/progress",
    tag = "Dossiers",
    operation_id = "updateDossierProgress",
    params(("id" = Uuid, Path, description = "Dossier id")),
    request_body = UpdateDossierProgressRequest,
    responses((status = 200, description = "Progress saved", body = crate::models::dossier::ClientProduitEligible)),
    security(("bearerAuth" = []))
)]
pub async fn update_dossier_progress(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(dossier_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateDossierProgressRequest>,
) -> Response {
    match DossierService::new(&state)
        .update_progress(&user, dossier_id, request)
        .await
    {
        Ok(dossier) => Json(ApiResponse::ok(dossier)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/dossiers/{id}/assign-expert",
    tag = "Dossiers",
    operation_id = "assignDossierExpert",
    params(("id" = Uuid, Path, description = "Dossier id")),
    request_body = AssignExpertRequest,
    responses(
        (status = 200, description = "Expert assigned", body = crate::models::dossier::ClientProduitEligible),
        (status = 400, description = "Expert is not approved")
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_expert(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(dossier_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<AssignExpertRequest>,
) -> Response {
    match DossierService::new(&state)
        .assign_expert(&user, dossier_id, request)
        .await
    {
        Ok(dossier) => Json(ApiResponse::ok(dossier)).into_response(),
        Err(e) => e.into_response(),
    }
}
