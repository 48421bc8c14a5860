// Authenticated caller and role guards for route groups

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::models::auth::{AccessTokenClaims, UserType};
use crate::utils::service_error::ServiceError;

/// Authenticated user information extracted from JWT
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub token_id: String,
    pub email: String,
    pub user_type: UserType,
    pub exp: u64,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: AccessTokenClaims) -> Option<Self> {
        let user_id = claims.user_id().ok()?;
        Some(Self {
            user_id,
            token_id: claims.jti,
            email: claims.email,
            user_type: claims.user_type,
            exp: claims.exp,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.user_type == UserType::Admin
    }

    pub fn is(&self, user_type: UserType) -> bool {
        self.user_type == user_type
    }

    /// `(id, type)` pair used by the audit log
    pub fn actor(&self) -> Option<(Uuid, &'static str)> {
        Some((self.user_id, self.user_type.as_str()))
    }

    pub fn require(&self, allowed: &[UserType]) -> Result<(), ServiceError> {
        if allowed.contains(&self.user_type) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "This operation is not available to {} accounts",
                self.user_type
            )))
        }
    }
}

fn forbidden(user_type: Option<UserType>) -> Response {
    let message = match user_type {
        Some(t) => format!("Access denied for {} accounts", t),
        None => "Authentication required".to_string(),
    };
    let status = if user_type.is_some() {
        StatusCode::FORBIDDEN
    } else {
        StatusCode::UNAUTHORIZED
    };
    (
        status,
        Json(json!({
            "success": false,
            "error": {
                "code": if user_type.is_some() { "FORBIDDEN" } else { "UNAUTHORIZED" },
                "description": message,
            },
            "message": message
        })),
    )
        .into_response()
}

async fn guard(allowed: &[UserType], request: Request<Body>, next: Next) -> Response {
    match request.extensions().get::<AuthenticatedUser>() {
        Some(user) if allowed.contains(&user.user_type) => next.run(request).await,
        Some(user) => {
            tracing::warn!(
                user_id = %user.user_id,
                user_type = %user.user_type,
                path = %request.uri().path(),
                "Role check failed"
            );
            forbidden(Some(user.user_type))
        },
        None => forbidden(None),
    }
}

pub async fn require_admin(request: Request<Body>, next: Next) -> Response {
    guard(&[UserType::Admin], request, next).await
}

pub async fn require_client(request: Request<Body>, next: Next) -> Response {
    guard(&[UserType::Client], request, next).await
}

pub async fn require_expert(request: Request<Body>, next: Next) -> Response {
    guard(&[UserType::Expert], request, next).await
}

pub async fn require_apporteur(request: Request<Body>, next: Next) -> Response {
    guard(&[UserType::Apporteur], request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(user_type: UserType) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: Uuid::new_v4(),
            token_id: "jti".into(),
            email: "someone@profitum.fr".into(),
            user_type,
            exp: 0,
        }
    }

    #[test]
    fn test_require_allows_listed_types() {
        let expert = user(UserType::Expert);
        assert!(expert.require(&[UserType::Expert, UserType::Admin]).is_ok());
        assert!(matches!(
            expert.require(&[UserType::Client]),
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[test]
    fn test_from_claims_rejects_bad_subject() {
        let claims = AccessTokenClaims {
            sub: "not-a-uuid".into(),
            jti: "j".into(),
            email: "a@b.fr".into(),
            user_type: UserType::Client,
            aud: "profitum.app".into(),
            iss: "profitum.app".into(),
            iat: 0,
            exp: 0,
        };
        assert!(AuthenticatedUser::from_claims(claims).is_none());
    }
}
