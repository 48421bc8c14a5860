// Error type shared by every resource service and handler
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel::result::DatabaseErrorKind;
use thiserror::Error;

use crate::utils::auth_errors::{AuthErrorResponse, ErrorDetail};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Database connection unavailable: {0}")]
    PoolError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid status transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal server error")]
    InternalError,
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Names the missing entity instead of the generic "Resource"
pub trait OrNotFound<T> {
    fn or_not_found(self, entity: &'static str) -> ServiceResult<T>;
}

impl<T> OrNotFound<T> for diesel::QueryResult<T> {
    fn or_not_found(self, entity: &'static str) -> ServiceResult<T> {
        self.map_err(|e| match e {
            diesel::result::Error::NotFound => ServiceError::NotFound(entity),
            other => other.into(),
        })
    }
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::PoolError(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::DatabaseError(_) => "DATABASE_ERROR",
            ServiceError::PoolError(_) => "DATABASE_UNAVAILABLE",
            ServiceError::ValidationError(_) => "VALIDATION_ERROR",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::Unauthorized => "UNAUTHORIZED",
            ServiceError::Forbidden(_) => "FORBIDDEN",
            ServiceError::InvalidTransition { .. } => "INVALID_TRANSITION",
            ServiceError::StorageError(_) => "STORAGE_ERROR",
            ServiceError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ServiceError::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Message exposed to API callers. Internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ServiceError::DatabaseError(_) | ServiceError::StorageError(_) => {
                "Internal server error".to_string()
            },
            ServiceError::PoolError(_) => "Service temporarily unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "Request failed");
        }

        let message = self.public_message();
        let body = AuthErrorResponse {
            success: false,
            error: ErrorDetail {
                code: self.error_code().to_string(),
                description: message.clone(),
                retry_after: None,
            },
            message,
        };

        (status, Json(body)).into_response()
    }
}

// Conversion from various error types
impl From<diesel::result::Error> for ServiceError {
    fn from(error: diesel::result::Error) -> Self {
        match error {
            diesel::result::Error::NotFound => ServiceError::NotFound("Resource"),
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                ServiceError::Conflict(info.message().to_string())
            },
            diesel::result::Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                ServiceError::ValidationError(format!(
                    "Referenced record does not exist ({})",
                    info.constraint_name().unwrap_or("foreign key")
                ))
            },
            _ => ServiceError::DatabaseError(error.to_string()),
        }
    }
}

impl From<bb8::RunError<diesel_async::pooled_connection::PoolError>> for ServiceError {
    fn from(error: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> Self {
        ServiceError::PoolError(error.to_string())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(crate::utils::validation::format_validation_errors(&errors))
    }
}

impl From<crate::utils::password::PasswordError> for ServiceError {
    fn from(error: crate::utils::password::PasswordError) -> Self {
        tracing::error!("Password hashing failed: {}", error);
        ServiceError::InternalError
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn test_diesel_not_found_maps_to_404() {
        let err: ServiceError = diesel::result::Error::NotFound.into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_or_not_found_names_entity() {
        let result: diesel::QueryResult<()> = Err(diesel::result::Error::NotFound);
        let err = result.or_not_found("Expert").unwrap_err();
        assert_eq!(err.to_string(), "Expert not found");

        let ok: diesel::QueryResult<i32> = Ok(3);
        assert_eq!(ok.or_not_found("Expert").unwrap(), 3);
    }

    #[test]
    fn test_transition_error_message() {
        let err = ServiceError::InvalidTransition {
            from: "termine".to_string(),
            to: "en_cours".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.to_string().contains("termine"));
    }

    #[tokio::test]
    async fn test_database_error_details_are_hidden() {
        let response =
            ServiceError::DatabaseError("relation \"clients\" does not exist".to_string())
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "DATABASE_ERROR");
        assert_eq!(json["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_forbidden_body_shape() {
        let response = ServiceError::Forbidden("Not your prospect".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Forbidden: Not your prospect");
    }
}
