// JWT token service: HS256 access tokens and stateless refresh tokens
// Access and refresh tokens are signed with separate secrets

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

use crate::models::auth::{AccessTokenClaims, RefreshTokenClaims, UserType};

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Token generation failed: {0}")]
    TokenGeneration(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token validation failed: {0}")]
    Validation(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            ErrorKind::InvalidToken | ErrorKind::InvalidSignature => JwtError::InvalidToken,
            _ => JwtError::Validation(err.to_string()),
        }
    }
}

// JWT configuration with separate keys for access and refresh tokens
#[derive(Clone)]
pub struct JwtConfig {
    pub access_token_expiry: u64,
    pub refresh_token_expiry: u64,
    pub algorithm: Algorithm,
    pub audience: String,
    pub issuer: String,
    access_encoding_key: EncodingKey,
    access_decoding_key: DecodingKey,
    refresh_encoding_key: EncodingKey,
    refresh_decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("refresh_token_expiry", &self.refresh_token_expiry)
            .field("algorithm", &self.algorithm)
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("keys", &"<redacted>")
            .finish()
    }
}

impl JwtConfig {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_expiry: u64,
        refresh_expiry: u64,
        audience: &str,
        issuer: &str,
    ) -> Self {
        JwtConfig {
            access_token_expiry: access_expiry,
            refresh_token_expiry: refresh_expiry,
            algorithm: Algorithm::HS256,
            audience: audience.to_string(),
            issuer: issuer.to_string(),
            access_encoding_key: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding_key: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding_key: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding_key: DecodingKey::from_secret(refresh_secret.as_bytes()),
        }
    }

    /// Build from the application configuration
    pub fn from_app_config(config: &crate::app_config::AppConfig) -> Self {
        let crate::app_config::JwtConfig {
            access_secret,
            refresh_secret,
            access_expiry,
            refresh_expiry,
            audience,
            issuer,
        } = &config.jwt;

        Self::new(
            access_secret,
            refresh_secret,
            *access_expiry,
            *refresh_expiry,
            audience,
            issuer,
        )
    }

    #[cfg(test)]
    pub fn for_test() -> Self {
        Self::new(
            "test-access-secret-hs256-with-enough-length",
            "test-refresh-secret-hs256-with-enough-length",
            3600,
            604800,
            "test.profitum.app",
            "test.profitum.app",
        )
    }
}

/// Tokens returned by every successful login
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

pub struct JwtService {
    config: JwtConfig,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    fn now() -> Result<u64, JwtError> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .map_err(|e| JwtError::TokenGeneration(e.to_string()))
    }

    pub fn access_token_expiry(&self) -> u64 {
        self.config.access_token_expiry
    }

    pub fn generate_access_token(
        &self,
        user_id: Uuid,
        email: &str,
        user_type: UserType,
    ) -> Result<String, JwtError> {
        let now = Self::now()?;
        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            email: email.to_string(),
            user_type,
            aud: self.config.audience.clone(),
            iss: self.config.issuer.clone(),
            iat: now,
            exp: now + self.config.access_token_expiry,
        };

        encode(
            &Header::new(self.config.algorithm),
            &claims,
            &self.config.access_encoding_key,
        )
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))
    }

    pub fn generate_refresh_token(
        &self,
        user_id: Uuid,
        user_type: UserType,
    ) -> Result<String, JwtError> {
        let now = Self::now()?;
        let claims = RefreshTokenClaims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            user_type,
            iat: now,
            exp: now + self.config.refresh_token_expiry,
        };

        encode(
            &Header::new(self.config.algorithm),
            &claims,
            &self.config.refresh_encoding_key,
        )
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))
    }

    pub fn generate_token_pair(
        &self,
        user_id: Uuid,
        email: &str,
        user_type: UserType,
    ) -> Result<TokenPair, JwtError> {
        Ok(TokenPair {
            token: self.generate_access_token(user_id, email, user_type)?,
            refresh_token: self.generate_refresh_token(user_id, user_type)?,
            expires_in: self.config.access_token_expiry,
        })
    }

    /// Validate an access token (signature, audience, issuer, expiry with no leeway)
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, JwtError> {
        let mut validation = Validation::new(self.config.algorithm);
        validation.set_audience(&[self.config.audience.clone()]);
        validation.set_issuer(&[self.config.issuer.clone()]);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = 0;

        let token_data =
            decode::<AccessTokenClaims>(token, &self.config.access_decoding_key, &validation)?;

        Ok(token_data.claims)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshTokenClaims, JwtError> {
        let mut validation = Validation::new(self.config.algorithm);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        let token_data =
            decode::<RefreshTokenClaims>(token, &self.config.refresh_decoding_key, &validation)?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_round_trip_keeps_type() {
        let service = JwtService::new(JwtConfig::for_test());
        let id = Uuid::new_v4();

        let token = service
            .generate_access_token(id, "expert@cabinet.fr", UserType::Expert)
            .unwrap();
        let claims = service.validate_access_token(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), id);
        assert_eq!(claims.user_type, UserType::Expert);
        assert_eq!(claims.email, "expert@cabinet.fr");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let service = JwtService::new(JwtConfig::for_test());
        let refresh = service
            .generate_refresh_token(Uuid::new_v4(), UserType::Client)
            .unwrap();

        assert!(service.validate_access_token(&refresh).is_err());
        assert!(service.validate_refresh_token(&refresh).is_ok());
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let issuer = JwtService::new(JwtConfig::new(
            "test-access-secret-hs256-with-enough-length",
            "test-refresh-secret-hs256-with-enough-length",
            3600,
            3600,
            "someone-else",
            "test.profitum.app",
        ));
        let token = issuer
            .generate_access_token(Uuid::new_v4(), "a@b.fr", UserType::Admin)
            .unwrap();

        let service = JwtService::new(JwtConfig::for_test());
        assert!(service.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_expired_token() {
        let service = JwtService::new(JwtConfig::new(
            "test-access-secret-hs256-with-enough-length",
            "test-refresh-secret-hs256-with-enough-length",
            0,
            0,
            "test.profitum.app",
            "test.profitum.app",
        ));
        let token = service
            .generate_access_token(Uuid::new_v4(), "a@b.fr", UserType::Client)
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));

        assert!(matches!(
            service.validate_access_token(&token),
            Err(JwtError::TokenExpired)
        ));
    }

    #[test]
    fn test_garbage_token() {
        let service = JwtService::new(JwtConfig::for_test());
        assert!(service.validate_access_token("not.a.jwt").is_err());
    }
}
