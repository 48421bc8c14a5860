// Dossier steps, timeline and comments handlers

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
        dossier_workflow::{
            CommentFilter, CreateCommentRequest, CreateTimelineEventRequest, TimelineQuery,
            UpdateCommentRequest, UpdateStepRequest,
        },
    },
    services::dossier_workflow::DossierWorkflowService,
    utils::extract::{ApiJson, ApiPath, ApiQuery},
};

/// Generated steps in order
#[utoipa::path(
    get,
    path = "/api/dossiers/{id}/steps",
    tag = "Dossier workflow",
    operation_id = "listDossierSteps",
    params(("id" = Uuid, Path, description = "Dossier id")),
    responses(
        (status = 200, description = "Steps of the dossier", body = [crate::models::dossier_workflow::DossierStep]),
        (status = 403, description = "Caller is not a participant")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_steps(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(dossier_id): ApiPath<Uuid>,
) -> Response {
    match DossierWorkflowService::new(&state).steps(&user, dossier_id).await {
        Ok(steps) => Json(ApiResponse::ok(steps)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/dossiers/{id}/steps/{step_id}",
    tag = "Dossier workflow",
    operation_id = "updateDossierStep",
    params(
        ("id" = Uuid, Path, description = "Dossier id"),
        ("step_id" = Uuid, Path, description = "Step id")
    ),
    request_body = UpdateStepRequest,
    responses(
        (status = 200, description = "Step saved; dossier progress recomputed", body = crate::models::dossier_workflow::DossierStep),
        (status = 403, description = "Only the assigned expert or an admin"),
        (status = 404, description = "Step not found on this dossier")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_step(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath((dossier_id, step_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(request): ApiJson<UpdateStepRequest>,
) -> Response {
    match DossierWorkflowService::new(&state)
        .update_step(&user, dossier_id, step_id, request)
        .await
    {
        Ok(step) => Json(ApiResponse::ok(step)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Newest first
#[utoipa::path(
    get,
    path = "/api/dossiers/{id}/timeline",
    tag = "Dossier workflow",
    operation_id = "getDossierTimeline",
    params(("id" = Uuid, Path, description = "Dossier id"), TimelineQuery),
    responses(
        (status = 200, description = "Timeline page", body = crate::models::dossier_workflow::TimelinePage),
        (status = 403, description = "Caller is not a participant")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_timeline(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(dossier_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<TimelineQuery>,
) -> Response {
    match DossierWorkflowService::new(&state)
        .timeline(&user, dossier_id, &query)
        .await
    {
        Ok(page) => Json(ApiResponse::ok(page)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/dossiers/{id}/timeline",
    tag = "Dossier workflow",
    operation_id = "addDossierTimelineEvent",
    params(("id" = Uuid, Path, description = "Dossier id")),
    request_body = CreateTimelineEventRequest,
    responses(
        (status = 201, description = "Event recorded", body = crate::models::dossier_workflow::DossierTimelineEvent),
        (status = 403, description = "Only the assigned expert or an admin")
    ),
    security(("bearerAuth" = []))
)]
pub async fn add_timeline_event(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(dossier_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<CreateTimelineEventRequest>,
) -> Response {
    match DossierWorkflowService::new(&state)
        .add_timeline_event(&user, dossier_id, request)
        .await
    {
        Ok(event) => (StatusCode::CREATED, Json(ApiResponse::ok(event))).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/dossiers/{id}/timeline/{event_id}",
    tag = "Dossier workflow",
    operation_id = "deleteDossierTimelineEvent",
    params(
        ("id" = Uuid, Path, description = "Dossier id"),
        ("event_id" = Uuid, Path, description = "Timeline event id")
    ),
    responses(
        (status = 200, description = "Event deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Event not found on this dossier")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_timeline_event(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath((dossier_id, event_id)): ApiPath<(Uuid, Uuid)>,
) -> Response {
    match DossierWorkflowService::new(&state)
        .delete_timeline_event(&user, dossier_id, event_id)
        .await
    {
        Ok(()) => Json(ApiResponse::message("Timeline event deleted")).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Internal thread; experts and apporteurs only see comments shared with them
#[utoipa::path(
    get,
    path = "/api/dossiers/{id}/comments",
    tag = "Dossier workflow",
    operation_id = "listDossierComments",
    params(("id" = Uuid, Path, description = "Dossier id"), CommentFilter),
    responses(
        (status = 200, description = "Comments visible to the caller", body = [crate::models::dossier_workflow::DossierComment]),
        (status = 403, description = "Clients and non-participants")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_comments(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(dossier_id): ApiPath<Uuid>,
    ApiQuery(filter): ApiQuery<CommentFilter>,
) -> Response {
    match DossierWorkflowService::new(&state)
        .comments(&user, dossier_id, &filter)
        .await
    {
        Ok(comments) => Json(ApiResponse::ok(comments)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/dossiers/{id}/comments",
    tag = "Dossier workflow",
    operation_id = "addDossierComment",
    params(("id" = Uuid, Path, description = "Dossier id")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = crate::models::dossier_workflow::DossierComment),
        (status = 403, description = "Clients and non-participants")
    ),
    security(("bearerAuth" = []))
)]
pub async fn add_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(dossier_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<CreateCommentRequest>,
) -> Response {
    match DossierWorkflowService::new(&state)
        .add_comment(&user, dossier_id, request)
        .await
    {
        Ok(comment) => (StatusCode::CREATED, Json(ApiResponse::ok(comment))).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/dossiers/{id}/comments/{comment_id}",
    tag = "Dossier workflow",
    operation_id = "updateDossierComment",
    params(
        ("id" = Uuid, Path, description = "Dossier id"),
        ("comment_id" = Uuid, Path, description = "Comment id")
    ),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Comment updated", body = crate::models::dossier_workflow::DossierComment),
        (status = 403, description = "Only the author or an admin, manual comments only")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath((dossier_id, comment_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(request): ApiJson<UpdateCommentRequest>,
) -> Response {
    match DossierWorkflowService::new(&state)
        .update_comment(&user, dossier_id, comment_id, request)
        .await
    {
        Ok(comment) => Json(ApiResponse::ok(comment)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/dossiers/{id}/comments/{comment_id}",
    tag = "Dossier workflow",
    operation_id = "deleteDossierComment",
    params(
        ("id" = Uuid, Path, description = "Dossier id"),
        ("comment_id" = Uuid, Path, description = "Comment id")
    ),
    responses(
        (status = 200, description = "Comment deleted"),
        (status = 403, description = "Only the author or an admin, manual comments only")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath((dossier_id, comment_id)): ApiPath<(Uuid, Uuid)>,
) -> Response {
    match DossierWorkflowService::new(&state)
        .delete_comment(&user, dossier_id, comment_id)
        .await
    {
        Ok(()) => Json(ApiResponse::message("Comment deleted")).into_response(),
        Err(e) => e.into_response(),
    }
}
