// JWT issuance and validation against the application configuration

mod common;

use common::test_config;
use profitum_backend::{models::auth::UserType, JwtConfig, JwtError, JwtService};
use uuid::Uuid;

fn service() -> JwtService {
    JwtService::new(JwtConfig::from_app_config(&test_config()))
}

#[test]
fn test_access_token_carries_account_type() {
    let jwt = service();
    let user_id = Uuid::new_v4();

    let token = jwt
        .generate_access_token(user_id, "expert@profitum.fr", UserType::Expert)
        .unwrap();
    let claims = jwt.validate_access_token(&token).unwrap();

    assert_eq!(claims.sub, user_id.to_string());
    assert_eq!(claims.email, "expert@profitum.fr");
    assert_eq!(claims.user_type, UserType::Expert);
    assert_eq!(claims.exp - claims.iat, jwt.access_token_expiry());
}

#[test]
fn test_token_pair_uses_distinct_secrets() {
    let jwt = service();
    let pair = jwt
        .generate_token_pair(Uuid::new_v4(), "client@profitum.fr", UserType::Client)
        .unwrap();

    assert!(jwt.validate_refresh_token(&pair.refresh_token).is_ok());
    assert!(jwt.validate_access_token(&pair.refresh_token).is_err());
    assert!(jwt.validate_refresh_token(&pair.token).is_err());
    assert_eq!(pair.expires_in, jwt.access_token_expiry());
}

#[test]
fn test_token_from_other_issuer_is_rejected() {
    let jwt = service();
    let foreign = JwtService::new(JwtConfig::new(
        "another-access-secret-long-enough-to-pass",
        "another-refresh-secret-long-enough-to-pass",
        3600,
        604800,
        "elsewhere.example",
        "elsewhere.example",
    ));

    let token = foreign
        .generate_access_token(Uuid::new_v4(), "admin@profitum.fr", UserType::Admin)
        .unwrap();

    assert!(matches!(
        jwt.validate_access_token(&token),
        Err(JwtError::InvalidToken)
    ));
}

#[test]
fn test_expired_token_is_rejected() {
    let config = test_config();
    let jwt = JwtService::new(JwtConfig::new(
        &config.jwt.access_secret,
        &config.jwt.refresh_secret,
        0,
        0,
        &config.jwt.audience,
        &config.jwt.issuer,
    ));

    let token = jwt
        .generate_access_token(Uuid::new_v4(), "client@profitum.fr", UserType::Client)
        .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(1100));

    assert!(matches!(
        jwt.validate_access_token(&token),
        Err(JwtError::TokenExpired)
    ));
}
