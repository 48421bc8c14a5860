// Expert handlers: public marketplace, own profile, admin approval workflow

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
        dossier::DossierFilter,
        expert::{
            CreateExpertRequest, Expert, ExpertFilter, RejectExpertRequest,
            UpdateExpertRequest,
        },
    },
    services::expert::ExpertService,
    utils::extract::{ApiJson, ApiPath, ApiQuery},
};

// =============================================================================
// MARKETPLACE
// =============================================================================

/// Approved and active experts only
#[utoipa::path(
    get,
    path = "/api/experts",
    tag = "Experts",
    operation_id = "listMarketplaceExperts",
    params(ExpertFilter, PaginationQuery),
    responses((status = 200, description = "Paginated public expert profiles"))
)]
pub async fn marketplace(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ExpertFilter>,
    ApiQuery(page): ApiQuery<PaginationQuery>,
) -> Response {
    match ExpertService::new(&state).marketplace(&filter, &page).await {
        Ok(experts) => Json(ApiResponse::ok(experts)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/experts/{id}",
    tag = "Experts",
    operation_id = "getMarketplaceExpert",
    params(("id" = Uuid, Path, description = "Expert id")),
    responses(
        (status = 200, description = "Public expert profile", body = crate::models::expert::ExpertPublic),
        (status = 404, description = "Expert not found or not available")
    )
)]
pub async fn marketplace_get(
    State(state): State<AppState>,
    ApiPath(expert_id): ApiPath<Uuid>,
) -> Response {
    match ExpertService::new(&state).marketplace_get(expert_id).await {
        Ok(expert) => Json(ApiResponse::ok(expert)).into_response(),
        Err(e) => e.into_response(),
    }
}

// =============================================================================
// SELF-SERVICE
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/expert/profile",
    tag = "Experts",
    operation_id = "getExpertProfile",
    responses((status = 200, description = "Own expert profile", body = Expert)),
    security(("bearerAuth" = []))
)]
pub async fn get_profile(State(state): State<AppState>, user: AuthenticatedUser) -> Response {
    match ExpertService::new(&state).profile(&user).await {
        Ok(expert) => Json(ApiResponse::ok(expert)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/expert/profile",
    tag = "Experts",
    operation_id = "updateExpertProfile",
    request_body = UpdateExpertRequest,
    responses((status = 200, description = "Profile updated", body = Expert)),
    security(("bearerAuth" = []))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<UpdateExpertRequest>,
) -> Response {
    match ExpertService::new(&state).update_profile(&user, request).await {
        Ok(expert) => Json(ApiResponse::ok(expert)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/expert/dossiers",
    tag = "Experts",
    operation_id = "listAssignedDossiers",
    params(DossierFilter, PaginationQuery),
    responses((status = 200, description = "Dossiers assigned to the expert")),
    security(("bearerAuth" = []))
)]
pub async fn assigned_dossiers(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiQuery(filter): ApiQuery<DossierFilter>,
    ApiQuery(page): ApiQuery<PaginationQuery>,
) -> Response {
    match ExpertService::new(&state)
        .assigned_dossiers(&user, &filter, &page)
        .await
    {
        Ok(dossiers) => Json(ApiResponse::ok(dossiers)).into_response(),
        Err(e) => e.into_response(),
    }
}

// =============================================================================
// ADMIN
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/admin/experts",
    tag = "Admin",
    operation_id = "listExperts",
    params(ExpertFilter, PaginationQuery),
    responses((status = 200, description = "Paginated experts")),
    security(("bearerAuth" = []))
)]
pub async fn list_experts(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ExpertFilter>,
    ApiQuery(page): ApiQuery<PaginationQuery>,
) -> Response {
    match ExpertService::new(&state).list(&filter, &page).await {
        Ok(experts) => Json(ApiResponse::ok(experts)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/experts/{id}",
    tag = "Admin",
    operation_id = "getExpert",
    params(("id" = Uuid, Path, description = "Expert id")),
    responses(
        (status = 200, description = "Expert", body = Expert),
        (status = 404, description = "Expert not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_expert(State(state): State<AppState>, ApiPath(expert_id): ApiPath<Uuid>) -> Response {
    match ExpertService::new(&state).get(expert_id).await {
        Ok(expert) => Json(ApiResponse::ok(expert)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/experts",
    tag = "Admin",
    operation_id = "createExpert",
    request_body = CreateExpertRequest,
    responses(
        (status = 201, description = "Expert created", body = Expert),
        (status = 409, description = "Email already registered")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_expert(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    ApiJson(request): ApiJson<CreateExpertRequest>,
) -> Response {
    match ExpertService::new(&state).create(&admin, request).await {
        Ok(expert) => (StatusCode::CREATED, Json(ApiResponse::ok(expert))).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/experts/{id}",
    tag = "Admin",
    operation_id = "updateExpert",
    params(("id" = Uuid, Path, description = "Expert id")),
    request_body = UpdateExpertRequest,
    responses((status = 200, description = "Expert updated", body = Expert)),
    security(("bearerAuth" = []))
)]
pub async fn update_expert(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    ApiPath(expert_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateExpertRequest>,
) -> Response {
    match ExpertService::new(&state)
        .update(&admin, expert_id, request)
        .await
    {
        Ok(expert) => Json(ApiResponse::ok(expert)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/experts/{id}/approve",
    tag = "Admin",
    operation_id = "approveExpert",
    params(("id" = Uuid, Path, description = "Expert id")),
    responses(
        (status = 200, description = "Expert approved", body = Expert),
        (status = 409, description = "Already approved")
    ),
    security(("bearerAuth" = []))
)]
pub async fn approve_expert(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    ApiPath(expert_id): ApiPath<Uuid>,
) -> Response {
    match ExpertService::new(&state).approve(&admin, expert_id).await {
        Ok(expert) => {
            Json(ApiResponse::with_message(expert, "Expert approved")).into_response()
        },
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/experts/{id}/reject",
    tag = "Admin",
    operation_id = "rejectExpert",
    params(("id" = Uuid, Path, description = "Expert id")),
    request_body = RejectExpertRequest,
    responses(
        (status = 200, description = "Expert rejected", body = Expert),
        (status = 400, description = "Reason missing")
    ),
    security(("bearerAuth" = []))
)]
pub async fn reject_expert(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    ApiPath(expert_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<RejectExpertRequest>,
) -> Response {
    match ExpertService::new(&state)
        .reject(&admin, expert_id, request)
        .await
    {
        Ok(expert) => {
            Json(ApiResponse::with_message(expert, "Expert rejected")).into_response()
        },
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/experts/{id}/suspend",
    tag = "Admin",
    operation_id = "suspendExpert",
    params(("id" = Uuid, Path, description = "Expert id")),
    responses((status = 200, description = "Expert suspended", body = Expert)),
    security(("bearerAuth" = []))
)]
pub async fn suspend_expert(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    ApiPath(expert_id): ApiPath<Uuid>,
) -> Response {
    match ExpertService::new(&state).suspend(&admin, expert_id).await {
        Ok(expert) => Json(ApiResponse::ok(expert)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/experts/{id}/reactivate",
    tag = "Admin",
    operation_id = "reactivateExpert",
    params(("id" = Uuid, Path, description = "Expert id")),
    responses((status = 200, description = "Expert reactivated", body = Expert)),
    security(("bearerAuth" = []))
)]
pub async fn reactivate_expert(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    ApiPath(expert_id): ApiPath<Uuid>,
) -> Response {
    match ExpertService::new(&state).reactivate(&admin, expert_id).await {
        Ok(expert) => Json(ApiResponse::ok(expert)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/admin/experts/{id}",
    tag = "Admin",
    operation_id = "deleteExpert",
    params(("id" = Uuid, Path, description = "Expert id")),
    responses((status = 200, description = "Expert soft-deleted")),
    security(("bearerAuth" = []))
)]
pub async fn delete_expert(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    ApiPath(expert_id): ApiPath<Uuid>,
) -> Response {
    match ExpertService::new(&state).delete(&admin, expert_id).await {
        Ok(()) => Json(ApiResponse::message("Expert deleted")).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/experts/stats",
    tag = "Admin",
    operation_id = "expertStats",
    responses((status = 200, description = "Experts by approval status", body = crate::models::common::StatusCounts)),
    security(("bearerAuth" = []))
)]
pub async fn expert_stats(State(state): State<AppState>) -> Response {
    match ExpertService::new(&state).stats().await {
        Ok(counts) => Json(ApiResponse::ok(counts)).into_response(),
        Err(e) => e.into_response(),
    }
}
