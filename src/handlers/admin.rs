// Admin dashboard

use axum::{
    extract::State,
    response::{IntoResponse, Json, Response},
};

use crate::{
    app::AppState,
    models::common::ApiResponse,
    services::admin::AdminService,
};

#[utoipa::path(
    get,
    path = "/api/admin/dashboard",
    tag = "Admin",
    operation_id = "adminDashboard",
    responses((status = 200, description = "Platform counters", body = crate::models::admin::AdminDashboard)),
    security(("bearerAuth" = []))
)]
pub async fn dashboard(State(state): State<AppState>) -> Response {
    match AdminService::new(&state).dashboard().await {
        Ok(dashboard) => Json(ApiResponse::ok(dashboard)).into_response(),
        Err(e) => e.into_response(),
    }
}
