// Document upload, download and validation handlers

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use uuid::Uuid;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        common::{ApiResponse, PaginationQuery},
        document::{
            DocumentFilter, UpdateDocumentRequest, UploadDocumentRequest,
            ValidateDocumentRequest,
        },
    },
    services::document::{content_disposition, DocumentService},
    utils::extract::{ApiJson, ApiPath, ApiQuery},
};

#[utoipa::path(
    post,
    path = "/api/documents",
    tag = "Documents",
    operation_id = "uploadDocument",
    request_body = UploadDocumentRequest,
    responses(
        (status = 201, description = "Document stored", body = crate::models::document::DocumentFile),
        (status = 400, description = "Bad base64 or MIME type not allowed"),
        (status = 413, description = "File exceeds the upload limit")
    ),
    security(("bearerAuth" = []))
)]
pub async fn upload_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<UploadDocumentRequest>,
) -> Response {
    match DocumentService::new(&state).upload(&user, request).await {
        Ok(document) => (StatusCode::CREATED, Json(ApiResponse::ok(document))).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/documents",
    tag = "Documents",
    operation_id = "listDocuments",
    params(DocumentFilter, PaginationQuery),
    responses((status = 200, description = "Paginated documents visible to the caller")),
    security(("bearerAuth" = []))
)]
pub async fn list_documents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiQuery(filter): ApiQuery<DocumentFilter>,
    ApiQuery(page): ApiQuery<PaginationQuery>,
) -> Response {
    match DocumentService::new(&state).list(&user, &filter, &page).await {
        Ok(documents) => Json(ApiResponse::ok(documents)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/documents/{id}",
    tag = "Documents",
    operation_id = "getDocument",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document metadata", body = crate::models::document::DocumentFile),
        (status = 404, description = "Document not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(document_id): ApiPath<Uuid>,
) -> Response {
    match DocumentService::new(&state).get(&user, document_id).await {
        Ok(document) => Json(ApiResponse::ok(document)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Raw bytes with the stored content type
#[utoipa::path(
    get,
    path = "/api/documents/{id}/download",
    tag = "Documents",
    operation_id = "downloadDocument",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 404, description = "Document not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn download_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(document_id): ApiPath<Uuid>,
) -> Response {
    match DocumentService::new(&state).download(&user, document_id).await {
        Ok(download) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, download.mime_type),
                (header::CONTENT_DISPOSITION, content_disposition(&download.filename)),
            ],
            download.bytes,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/documents/{id}",
    tag = "Documents",
    operation_id = "updateDocument",
    params(("id" = Uuid, Path, description = "Document id")),
    request_body = UpdateDocumentRequest,
    responses((status = 200, description = "Document updated", body = crate::models::document::DocumentFile)),
    security(("bearerAuth" = []))
)]
pub async fn update_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(document_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateDocumentRequest>,
) -> Response {
    match DocumentService::new(&state)
        .update(&user, document_id, request)
        .await
    {
        Ok(document) => Json(ApiResponse::ok(document)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/documents/{id}/validate",
    tag = "Documents",
    operation_id = "validateDocument",
    params(("id" = Uuid, Path, description = "Document id")),
    request_body = ValidateDocumentRequest,
    responses(
        (status = 200, description = "Document validated or rejected", body = crate::models::document::DocumentFile),
        (status = 403, description = "Caller is not the assigned expert or an admin")
    ),
    security(("bearerAuth" = []))
)]
pub async fn validate_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(document_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<ValidateDocumentRequest>,
) -> Response {
    match DocumentService::new(&state)
        .validate(&user, document_id, request)
        .await
    {
        Ok(document) => Json(ApiResponse::ok(document)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/documents/{id}",
    tag = "Documents",
    operation_id = "deleteDocument",
    params(("id" = Uuid, Path, description = "Document id")),
    responses((status = 200, description = "Document deleted")),
    security(("bearerAuth" = []))
)]
pub async fn delete_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(document_id): ApiPath<Uuid>,
) -> Response {
    match DocumentService::new(&state).delete(&user, document_id).await {
        Ok(()) => Json(ApiResponse::message("Document deleted")).into_response(),
        Err(e) => e.into_response(),
    }
}
