// Product catalog handlers

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use uuid::Uuid;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        common::ApiResponse,
        produit::{CreateProduitRequest, UpdateProduitRequest},
    },
    services::produit::ProduitService,
    utils::extract::{ApiJson, ApiPath},
};

#[utoipa::path(
    get,
    path = "/api/produits",
    tag = "Produits",
    operation_id = "listProduits",
    responses((status = 200, description = "Active products", body = [crate::models::produit::ProduitEligible]))
)]
pub async fn list_produits(State(state): State<AppState>) -> Response {
    match ProduitService::new(&state).list_active().await {
        Ok(produits) => Json(ApiResponse::ok(produits)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/produits/{id}",
    tag = "Produits",
    operation_id = "getProduit",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = crate::models::produit::ProduitEligible),
        (status = 404, description = "Unknown or inactive product")
    )
)]
pub async fn get_produit(
    State(state): State<AppState>,
    user: Option<Extension<AuthenticatedUser>>,
    ApiPath(produit_id): ApiPath<Uuid>,
) -> Response {
    let user = user.map(|Extension(user)| user);
    match ProduitService::new(&state)
        .get(user.as_ref(), produit_id)
        .await
    {
        Ok(produit) => Json(ApiResponse::ok(produit)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Includes inactive products
#[utoipa::path(
    get,
    path = "/api/admin/produits",
    tag = "Admin",
    operation_id = "listAllProduits",
    responses((status = 200, description = "Whole catalog", body = [crate::models::produit::ProduitEligible])),
    security(("bearerAuth" = []))
)]
pub async fn list_all_produits(State(state): State<AppState>) -> Response {
    match ProduitService::new(&state).list_all().await {
        Ok(produits) => Json(ApiResponse::ok(produits)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/produits",
    tag = "Admin",
    operation_id = "createProduit",
    request_body = CreateProduitRequest,
    responses(
        (status = 201, description = "Product created", body = crate::models::produit::ProduitEligible),
        (status = 409, description = "Code already used")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_produit(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    ApiJson(request): ApiJson<CreateProduitRequest>,
) -> Response {
    match ProduitService::new(&state).create(&admin, request).await {
        Ok(produit) => (StatusCode::CREATED, Json(ApiResponse::ok(produit))).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/produits/{id}",
    tag = "Admin",
    operation_id = "updateProduit",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = UpdateProduitRequest,
    responses((status = 200, description = "Product updated", body = crate::models::produit::ProduitEligible)),
    security(("bearerAuth" = []))
)]
pub async fn update_produit(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    ApiPath(produit_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateProduitRequest>,
) -> Response {
    match ProduitService::new(&state)
        .update(&admin, produit_id, request)
        .await
    {
        Ok(produit) => Json(ApiResponse::ok(produit)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Products are deactivated, never removed, so existing dossiers keep their reference
#[utoipa::path(
    delete,
    path = "/api/admin/produits/{id}",
    tag = "Admin",
    operation_id = "deactivateProduit",
    params(("id" = Uuid, Path, description = "Product id")),
    responses((status = 200, description = "Product deactivated", body = crate::models::produit::ProduitEligible)),
    security(("bearerAuth" = []))
)]
pub async fn deactivate_produit(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    ApiPath(produit_id): ApiPath<Uuid>,
) -> Response {
    match ProduitService::new(&state)
        .deactivate(&admin, produit_id)
        .await
    {
        Ok(produit) => {
            Json(ApiResponse::with_message(produit, "Product deactivated")).into_response()
        },
        Err(e) => e.into_response(),
    }
}
