// Client handlers: own profile and admin management

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
        client::{
            Client, ClientFilter, CreateClientRequest, UpdateClientProfileRequest,
            UpdateClientStatusRequest,
        },
        common::{ApiResponse, PaginationQuery},
    },
    services::client::ClientService,
    utils::extract::{ApiJson, ApiPath, ApiQuery},
};

// =============================================================================
// SELF-SERVICE
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/client/profile",
    tag = "Clients",
    operation_id = "getClientProfile",
    responses(
        (status = 200, description = "Own client profile", body = Client),
        (status = 404, description = "Account removed")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_profile(State(state): State<AppState>, user: AuthenticatedUser) -> Response {
    match ClientService::new(&state).profile(&user).await {
        Ok(client) => Json(ApiResponse::ok(client)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/client/profile",
    tag = "Clients",
    operation_id = "updateClientProfile",
    request_body = UpdateClientProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = Client),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "SIREN already registered")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<UpdateClientProfileRequest>,
) -> Response {
    match ClientService::new(&state).update_profile(&user, request).await {
        Ok(client) => Json(ApiResponse::ok(client)).into_response(),
        Err(e) => e.into_response(),
    }
}

// =============================================================================
// ADMIN
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/admin/clients",
    tag = "Admin",
    operation_id = "listClients",
    params(ClientFilter, PaginationQuery),
    responses((status = 200, description = "Paginated clients")),
    security(("bearerAuth" = []))
)]
pub async fn list_clients(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ClientFilter>,
    ApiQuery(page): ApiQuery<PaginationQuery>,
) -> Response {
    match ClientService::new(&state).list(&filter, &page).await {
        Ok(clients) => Json(ApiResponse::ok(clients)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/clients/{id}",
    tag = "Admin",
    operation_id = "getClient",
    params(("id" = Uuid, Path, description = "Client id")),
    responses(
        (status = 200, description = "Client with dossiers", body = crate::models::client::ClientDetail),
        (status = 404, description = "Client not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_client(State(state): State<AppState>, ApiPath(client_id): ApiPath<Uuid>) -> Response {
    match ClientService::new(&state).get(client_id).await {
        Ok(detail) => Json(ApiResponse::ok(detail)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/clients",
    tag = "Admin",
    operation_id = "createClient",
    request_body = CreateClientRequest,
    responses(
        (status = 201, description = "Client created", body = crate::models::client::CreatedClient),
        (status = 409, description = "Email already registered")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_client(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    ApiJson(request): ApiJson<CreateClientRequest>,
) -> Response {
    match ClientService::new(&state).create(&admin, request).await {
        Ok(created) => (StatusCode::CREATED, Json(ApiResponse::ok(created))).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/clients/{id}/status",
    tag = "Admin",
    operation_id = "updateClientStatus",
    params(("id" = Uuid, Path, description = "Client id")),
    request_body = UpdateClientStatusRequest,
    responses((status = 200, description = "Status changed", body = Client)),
    security(("bearerAuth" = []))
)]
pub async fn update_client_status(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    ApiPath(client_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateClientStatusRequest>,
) -> Response {
    match ClientService::new(&state)
        .update_status(&admin, client_id, request)
        .await
    {
        Ok(client) => Json(ApiResponse::ok(client)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/admin/clients/{id}",
    tag = "Admin",
    operation_id = "deleteClient",
    params(("id" = Uuid, Path, description = "Client id")),
    responses(
        (status = 200, description = "Client soft-deleted"),
        (status = 404, description = "Client not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_client(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    ApiPath(client_id): ApiPath<Uuid>,
) -> Response {
    match ClientService::new(&state).delete(&admin, client_id).await {
        Ok(()) => Json(ApiResponse::message("Client deleted")).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/clients/stats",
    tag = "Admin",
    operation_id = "clientStats",
    responses((status = 200, description = "Clients by statut", body = crate::models::common::StatusCounts)),
    security(("bearerAuth" = []))
)]
pub async fn client_stats(State(state): State<AppState>) -> Response {
    match ClientService::new(&state).stats().await {
        Ok(counts) => Json(ApiResponse::ok(counts)).into_response(),
        Err(e) => e.into_response(),
    }
}
