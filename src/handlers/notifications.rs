// In-app notification handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        common::{AffectedCount, ApiResponse, PaginationQuery},
        notification::{
            CreateNotificationRequest, Notification, NotificationFilter,
            StarRequest, UpdatePreferencesRequest,
        },
    },
    services::notification::NotificationService,
    utils::extract::{ApiJson, ApiPath, ApiQuery},
};

/// Returns 201 with the notification, or 200 without data when the
/// recipient's preferences suppressed it
#[utoipa::path(
    post,
    path = "/api/notifications",
    tag = "Notifications",
    operation_id = "createNotification",
    request_body = CreateNotificationRequest,
    responses(
        (status = 201, description = "Notification created", body = Notification),
        (status = 200, description = "Suppressed by the recipient's preferences")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_notification(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<CreateNotificationRequest>,
) -> Response {
    match NotificationService::new(&state).create(&user, request).await {
        Ok(Some(notification)) => {
            (StatusCode::CREATED, Json(ApiResponse::ok(notification))).into_response()
        },
        Ok(None) => Json(ApiResponse::message(
            "Notification skipped by recipient preferences",
        ))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "Notifications",
    operation_id = "listNotifications",
    params(NotificationFilter, PaginationQuery),
    responses((status = 200, description = "Paginated notifications")),
    security(("bearerAuth" = []))
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiQuery(filter): ApiQuery<NotificationFilter>,
    ApiQuery(page): ApiQuery<PaginationQuery>,
) -> Response {
    match NotificationService::new(&state)
        .list(&user, &filter, &page)
        .await
    {
        Ok(notifications) => Json(ApiResponse::ok(notifications)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/notifications/unread-count",
    tag = "Notifications",
    operation_id = "unreadNotificationCount",
    responses((status = 200, description = "`{ count }` of unread notifications")),
    security(("bearerAuth" = []))
)]
pub async fn unread_count(State(state): State<AppState>, user: AuthenticatedUser) -> Response {
    match NotificationService::new(&state).unread_count(&user).await {
        Ok(count) => Json(ApiResponse::ok(json!({ "count": count }))).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/notifications/{id}/read",
    tag = "Notifications",
    operation_id = "markNotificationRead",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses((status = 200, description = "Marked read", body = Notification)),
    security(("bearerAuth" = []))
)]
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Response {
    match NotificationService::new(&state).mark_read(&user, id).await {
        Ok(notification) => Json(ApiResponse::ok(notification)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/notifications/{id}/star",
    tag = "Notifications",
    operation_id = "starNotification",
    params(("id" = Uuid, Path, description = "Notification id")),
    request_body = StarRequest,
    responses((status = 200, description = "Star flag set", body = Notification)),
    security(("bearerAuth" = []))
)]
pub async fn set_starred(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<StarRequest>,
) -> Response {
    match NotificationService::new(&state)
        .set_starred(&user, id, request.starred)
        .await
    {
        Ok(notification) => Json(ApiResponse::ok(notification)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/notifications/{id}/archive",
    tag = "Notifications",
    operation_id = "archiveNotification",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses((status = 200, description = "Archived", body = Notification)),
    security(("bearerAuth" = []))
)]
pub async fn archive(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Response {
    match NotificationService::new(&state).archive(&user, id).await {
        Ok(notification) => Json(ApiResponse::ok(notification)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/notifications/{id}/unarchive",
    tag = "Notifications",
    operation_id = "unarchiveNotification",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses((status = 200, description = "Restored as read", body = Notification)),
    security(("bearerAuth" = []))
)]
pub async fn unarchive(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Response {
    match NotificationService::new(&state).unarchive(&user, id).await {
        Ok(notification) => Json(ApiResponse::ok(notification)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/notifications/mark-all-read",
    tag = "Notifications",
    operation_id = "markAllNotificationsRead",
    responses((status = 200, description = "Number of notifications marked", body = AffectedCount)),
    security(("bearerAuth" = []))
)]
pub async fn mark_all_read(State(state): State<AppState>, user: AuthenticatedUser) -> Response {
    match NotificationService::new(&state).mark_all_read(&user).await {
        Ok(count) => Json(ApiResponse::ok(AffectedCount { count })).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/notifications/delete-all-read",
    tag = "Notifications",
    operation_id = "deleteAllReadNotifications",
    responses((status = 200, description = "Number of notifications deleted", body = AffectedCount)),
    security(("bearerAuth" = []))
)]
pub async fn delete_all_read(State(state): State<AppState>, user: AuthenticatedUser) -> Response {
    match NotificationService::new(&state).delete_all_read(&user).await {
        Ok(count) => Json(ApiResponse::ok(AffectedCount { count })).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/notifications/{id}",
    tag = "Notifications",
    operation_id = "deleteNotification",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses((status = 200, description = "Deleted")),
    security(("bearerAuth" = []))
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Response {
    match NotificationService::new(&state).delete(&user, id).await {
        Ok(()) => Json(ApiResponse::message("Notification deleted")).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/notifications/preferences",
    tag = "Notifications",
    operation_id = "getNotificationPreferences",
    responses((status = 200, description = "Preferences, defaults if never saved", body = crate::models::notification::NotificationPreferences)),
    security(("bearerAuth" = []))
)]
pub async fn get_preferences(State(state): State<AppState>, user: AuthenticatedUser) -> Response {
    match NotificationService::new(&state).preferences(&user).await {
        Ok(preferences) => Json(ApiResponse::ok(preferences)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/notifications/preferences",
    tag = "Notifications",
    operation_id = "updateNotificationPreferences",
    request_body = UpdatePreferencesRequest,
    responses((status = 200, description = "Preferences saved", body = crate::models::notification::NotificationPreferences)),
    security(("bearerAuth" = []))
)]
pub async fn update_preferences(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<UpdatePreferencesRequest>,
) -> Response {
    match NotificationService::new(&state)
        .update_preferences(&user, request)
        .await
    {
        Ok(preferences) => Json(ApiResponse::ok(preferences)).into_response(),
        Err(e) => e.into_response(),
    }
}
