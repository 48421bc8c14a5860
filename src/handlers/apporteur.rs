// Apporteur handlers: admin management, own profile and prospect pipeline

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
        apporteur::{
            Apporteur, ApporteurFilter, CreateApporteurRequest,
            CreateProspectRequest, UpdateApporteurRequest,
            UpdateApporteurStatusRequest,
        },
        client::{ClientFilter, UpdateClientProfileRequest},
        common::{ApiResponse, PaginationQuery},
    },
    services::apporteur::ApporteurService,
    utils::extract::{ApiJson, ApiPath, ApiQuery},
};

// =============================================================================
// ADMIN
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/admin/apporteurs",
    tag = "Admin",
    operation_id = "listApporteurs",
    params(ApporteurFilter, PaginationQuery),
    responses((status = 200, description = "Paginated apporteurs")),
    security(("bearerAuth" = []))
)]
pub async fn list_apporteurs(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ApporteurFilter>,
    ApiQuery(page): ApiQuery<PaginationQuery>,
) -> Response {
    match ApporteurService::new(&state).list(&filter, &page).await {
        Ok(apporteurs) => Json(ApiResponse::ok(apporteurs)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/apporteurs/{id}",
    tag = "Admin",
    operation_id = "getApporteur",
    params(("id" = Uuid, Path, description = "Apporteur id")),
    responses(
        (status = 200, description = "Apporteur", body = Apporteur),
        (status = 404, description = "Apporteur not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_apporteur(
    State(state): State<AppState>,
    ApiPath(apporteur_id): ApiPath<Uuid>,
) -> Response {
    match ApporteurService::new(&state).get(apporteur_id).await {
        Ok(apporteur) => Json(ApiResponse::ok(apporteur)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/apporteurs",
    tag = "Admin",
    operation_id = "createApporteur",
    request_body = CreateApporteurRequest,
    responses(
        (status = 201, description = "Apporteur created", body = Apporteur),
        (status = 409, description = "Email already registered")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_apporteur(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    ApiJson(request): ApiJson<CreateApporteurRequest>,
) -> Response {
    match ApporteurService::new(&state).create(&admin, request).await {
        Ok(apporteur) => (StatusCode::CREATED, Json(ApiResponse::ok(apporteur))).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/apporteurs/{id}",
    tag = "Admin",
    operation_id = "updateApporteur",
    params(("id" = Uuid, Path, description = "Apporteur id")),
    request_body = UpdateApporteurRequest,
    responses((status = 200, description = "Apporteur updated", body = Apporteur)),
    security(("bearerAuth" = []))
)]
pub async fn update_apporteur(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    ApiPath(apporteur_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateApporteurRequest>,
) -> Response {
    match ApporteurService::new(&state)
        .update(&admin, apporteur_id, request)
        .await
    {
        Ok(apporteur) => Json(ApiResponse::ok(apporteur)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/apporteurs/{id}/status",
    tag = "Admin",
    operation_id = "updateApporteurStatus",
    params(("id" = Uuid, Path, description = "Apporteur id")),
    request_body = UpdateApporteurStatusRequest,
    responses((status = 200, description = "Status changed", body = Apporteur)),
    security(("bearerAuth" = []))
)]
pub async fn update_apporteur_status(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    ApiPath(apporteur_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateApporteurStatusRequest>,
) -> Response {
    match ApporteurService::new(&state)
        .set_status(&admin, apporteur_id, request)
        .await
    {
        Ok(apporteur) => Json(ApiResponse::ok(apporteur)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/admin/apporteurs/{id}",
    tag = "Admin",
    operation_id = "deleteApporteur",
    params(("id" = Uuid, Path, description = "Apporteur id")),
    responses((status = 200, description = "Apporteur soft-deleted")),
    security(("bearerAuth" = []))
)]
pub async fn delete_apporteur(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    ApiPath(apporteur_id): ApiPath<Uuid>,
) -> Response {
    match ApporteurService::new(&state).delete(&admin, apporteur_id).await {
        Ok(()) => Json(ApiResponse::message("Apporteur deleted")).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/apporteurs/stats",
    tag = "Admin",
    operation_id = "apporteurCounts",
    responses((status = 200, description = "Apporteurs by status", body = crate::models::common::StatusCounts)),
    security(("bearerAuth" = []))
)]
pub async fn apporteur_counts(State(state): State<AppState>) -> Response {
    match ApporteurService::new(&state).counts().await {
        Ok(counts) => Json(ApiResponse::ok(counts)).into_response(),
        Err(e) => e.into_response(),
    }
}

// =============================================================================
// SELF-SERVICE
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/apporteur/profile",
    tag = "Apporteurs",
    operation_id = "getApporteurProfile",
    responses((status = 200, description = "Own apporteur profile", body = Apporteur)),
    security(("bearerAuth" = []))
)]
pub async fn get_profile(State(state): State<AppState>, user: AuthenticatedUser) -> Response {
    match ApporteurService::new(&state).profile(&user).await {
        Ok(apporteur) => Json(ApiResponse::ok(apporteur)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/apporteur/profile",
    tag = "Apporteurs",
    operation_id = "updateApporteurProfile",
    request_body = UpdateApporteurRequest,
    responses((status = 200, description = "Profile updated", body = Apporteur)),
    security(("bearerAuth" = []))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<UpdateApporteurRequest>,
) -> Response {
    match ApporteurService::new(&state)
        .update_profile(&user, request)
        .await
    {
        Ok(apporteur) => Json(ApiResponse::ok(apporteur)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/apporteur/stats",
    tag = "Apporteurs",
    operation_id = "apporteurStats",
    responses((status = 200, description = "Prospects, dossiers and commission", body = crate::models::apporteur::ApporteurStats)),
    security(("bearerAuth" = []))
)]
pub async fn stats(State(state): State<AppState>, user: AuthenticatedUser) -> Response {
    match ApporteurService::new(&state).stats(&user).await {
        Ok(stats) => Json(ApiResponse::ok(stats)).into_response(),
        Err(e) => e.into_response(),
    }
}

// =============================================================================
// PROSPECTS
// =============================================================================

#[utoipa::path(
    post,
    path = "/api/apporteur/prospects",
    tag = "Apporteurs",
    operation_id = "createProspect",
    request_body = CreateProspectRequest,
    responses(
        (status = 201, description = "Prospect created", body = crate::models::client::Client),
        (status = 409, description = "Email already registered")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_prospect(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<CreateProspectRequest>,
) -> Response {
    match ApporteurService::new(&state)
        .create_prospect(&user, request)
        .await
    {
        Ok(prospect) => (StatusCode::CREATED, Json(ApiResponse::ok(prospect))).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/apporteur/prospects",
    tag = "Apporteurs",
    operation_id = "listProspects",
    params(ClientFilter, PaginationQuery),
    responses((status = 200, description = "Own prospects and clients")),
    security(("bearerAuth" = []))
)]
pub async fn list_prospects(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiQuery(filter): ApiQuery<ClientFilter>,
    ApiQuery(page): ApiQuery<PaginationQuery>,
) -> Response {
    match ApporteurService::new(&state)
        .list_prospects(&user, &filter, &page)
        .await
    {
        Ok(prospects) => Json(ApiResponse::ok(prospects)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/apporteur/prospects/{id}",
    tag = "Apporteurs",
    operation_id = "getProspect",
    params(("id" = Uuid, Path, description = "crate::models::client::Client id")),
    responses(
        (status = 200, description = "Prospect with dossiers", body = crate::models::client::ClientDetail),
        (status = 403, description = "Prospect belongs to another apporteur")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_prospect(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(client_id): ApiPath<Uuid>,
) -> Response {
    match ApporteurService::new(&state)
        .get_prospect(&user, client_id)
        .await
    {
        Ok(detail) => Json(ApiResponse::ok(detail)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/apporteur/prospects/{id}",
    tag = "Apporteurs",
    operation_id = "updateProspect",
    params(("id" = Uuid, Path, description = "crate::models::client::Client id")),
    request_body = UpdateClientProfileRequest,
    responses((status = 200, description = "Prospect updated", body = crate::models::client::Client)),
    security(("bearerAuth" = []))
)]
pub async fn update_prospect(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(client_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateClientProfileRequest>,
) -> Response {
    match ApporteurService::new(&state)
        .update_prospect(&user, client_id, request)
        .await
    {
        Ok(prospect) => Json(ApiResponse::ok(prospect)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/apporteur/prospects/{id}",
    tag = "Apporteurs",
    operation_id = "deleteProspect",
    params(("id" = Uuid, Path, description = "crate::models::client::Client id")),
    responses((status = 200, description = "Prospect deleted")),
    security(("bearerAuth" = []))
)]
pub async fn delete_prospect(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(client_id): ApiPath<Uuid>,
) -> Response {
    match ApporteurService::new(&state)
        .delete_prospect(&user, client_id)
        .await
    {
        Ok(()) => Json(ApiResponse::message("Prospect deleted")).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/apporteur/prospects/{id}/convert",
    tag = "Apporteurs",
    operation_id = "convertProspect",
    params(("id" = Uuid, Path, description = "crate::models::client::Client id")),
    responses(
        (status = 200, description = "Prospect is now an active client", body = crate::models::client::Client),
        (status = 400, description = "crate::models::client::Client is not a prospect")
    ),
    security(("bearerAuth" = []))
)]
pub async fn convert_prospect(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(client_id): ApiPath<Uuid>,
) -> Response {
    match ApporteurService::new(&state)
        .convert_prospect(&user, client_id)
        .await
    {
        Ok(client) => {
            Json(ApiResponse::with_message(client, "Prospect converted")).into_response()
        },
        Err(e) => e.into_response(),
    }
}

/// The temporary password is only ever returned here
#[utoipa::path(
    post,
    path = "/api/apporteur/prospects/{id}/credentials",
    tag = "Apporteurs",
    operation_id = "issueProspectCredentials",
    params(("id" = Uuid, Path, description = "crate::models::client::Client id")),
    responses((status = 201, description = "Temporary credentials", body = crate::models::apporteur::ProspectCredentials)),
    security(("bearerAuth" = []))
)]
pub async fn issue_credentials(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(client_id): ApiPath<Uuid>,
) -> Response {
    match ApporteurService::new(&state)
        .issue_credentials(&user, client_id)
        .await
    {
        Ok(credentials) => {
            (StatusCode::CREATED, Json(ApiResponse::ok(credentials))).into_response()
        },
        Err(e) => e.into_response(),
    }
}
