// Authentication-specific error handling utilities

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use thiserror::Error;

/// Authentication-specific errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Expert account is not approved (status: {0})")]
    ExpertNotApproved(String),

    #[error("An account already exists for this email")]
    EmailTaken,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Token generation failed: {0}")]
    TokenError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Internal server error")]
    InternalError,
}

/// Standard error response structure
#[derive(Debug, Serialize)]
pub struct AuthErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl AuthError {
    /// Convert to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::AccountInactive => StatusCode::FORBIDDEN,
            AuthError::ExpertNotApproved(_) => StatusCode::FORBIDDEN,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::TokenError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert to error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::AccountInactive => "ACCOUNT_INACTIVE",
            AuthError::ExpertNotApproved(_) => "EXPERT_NOT_APPROVED",
            AuthError::EmailTaken => "EMAIL_TAKEN",
            AuthError::DatabaseError(_) => "DATABASE_ERROR",
            AuthError::TokenError(_) => "TOKEN_ERROR",
            AuthError::ValidationError(_) => "VALIDATION_ERROR",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::InternalError => "INTERNAL_ERROR",
        }
    }

    fn public_message(&self) -> String {
        match self {
            AuthError::DatabaseError(_) | AuthError::TokenError(_) => {
                "Internal server error".to_string()
            },
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Authentication request failed");
        }

        let message = self.public_message();
        let response = AuthErrorResponse {
            success: false,
            error: ErrorDetail {
                code: self.error_code().to_string(),
                description: message.clone(),
                retry_after: None,
            },
            message,
        };

        (status, Json(response)).into_response()
    }
}

impl From<diesel::result::Error> for AuthError {
    fn from(error: diesel::result::Error) -> Self {
        match error {
            diesel::result::Error::NotFound => AuthError::UserNotFound,
            _ => AuthError::DatabaseError(error.to_string()),
        }
    }
}

impl From<bb8::RunError<diesel_async::pooled_connection::PoolError>> for AuthError {
    fn from(error: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> Self {
        AuthError::DatabaseError(error.to_string())
    }
}

impl From<crate::services::jwt::JwtError> for AuthError {
    fn from(error: crate::services::jwt::JwtError) -> Self {
        use crate::services::jwt::JwtError;
        match error {
            JwtError::TokenGeneration(msg) => AuthError::TokenError(msg),
            _ => AuthError::InvalidToken,
        }
    }
}

impl From<crate::utils::password::PasswordError> for AuthError {
    fn from(error: crate::utils::password::PasswordError) -> Self {
        tracing::error!("Password operation failed: {}", error);
        AuthError::InternalError
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AuthError::ValidationError(crate::utils::validation::format_validation_errors(&errors))
    }
}

/// Helper function to log authentication failures
pub fn log_auth_failure(
    user_email: &str,
    account_type: &str,
    error: &AuthError,
    user_agent: Option<&str>,
) {
    tracing::warn!(
        email = user_email,
        account_type = account_type,
        user_agent = user_agent.unwrap_or("unknown"),
        error_code = error.error_code(),
        "Authentication failure"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AuthError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::ExpertNotApproved("pending".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AuthError::EmailTaken.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_not_approved_message_mentions_status() {
        let err = AuthError::ExpertNotApproved("rejected".into());
        assert!(err.to_string().contains("rejected"));
        assert_eq!(err.error_code(), "EXPERT_NOT_APPROVED");
    }

    #[test]
    fn test_token_error_is_not_leaked() {
        let err = AuthError::TokenError("EncodingKey broken".into());
        assert_eq!(err.public_message(), "Internal server error");
    }
}
