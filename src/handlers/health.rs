// Health check

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::{app::AppState, db};

/// 200 when a pooled connection can be checked out, 503 otherwise
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    operation_id = "healthCheck",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Database unreachable")
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Response {
    let timestamp = chrono::Utc::now().to_rfc3339();
    let pool_state = state.diesel_pool.state();

    let (healthy, postgres) = match db::check_diesel_health(&state.diesel_pool).await {
        Ok(()) => (
            true,
            json!({
                "status": "healthy",
                "max_connections": state.max_connections,
                "connections": pool_state.connections,
                "idle_connections": pool_state.idle_connections,
                "error": null
            }),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                false,
                json!({
                    "status": "unhealthy",
                    "max_connections": state.max_connections,
                    "error": format!("Database connection failed: {}", e)
                }),
            )
        },
    };

    let body = json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "service": "profitum-backend",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": timestamp,
        "components": { "postgresql": postgres }
    });

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}
