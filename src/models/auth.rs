// Token claims and account-type definitions shared by auth code

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{admin::Admin, apporteur::Apporteur, client::Client, expert::Expert};
use crate::utils::validation::{
    validate_password_strength, PHONE_REGEX, POSTAL_CODE_REGEX, SIREN_REGEX,
};

/// The four kinds of accounts on the platform. Each lives in its own table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Client,
    Expert,
    #[serde(alias = "apporteur_affaires")]
    Apporteur,
    Admin,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Client => "client",
            UserType::Expert => "expert",
            UserType::Apporteur => "apporteur",
            UserType::Admin => "admin",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "client" => Ok(UserType::Client),
            "expert" => Ok(UserType::Expert),
            "apporteur" | "apporteur_affaires" => Ok(UserType::Apporteur),
            "admin" => Ok(UserType::Admin),
            other => Err(format!("Unknown account type: {}", other)),
        }
    }
}

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    /// Account id (subject) in the table for `user_type`
    pub sub: String,
    pub jti: String,
    pub email: String,
    #[serde(rename = "type")]
    pub user_type: UserType,
    pub aud: String,
    pub iss: String,
    pub iat: u64,
    pub exp: u64,
}

/// Refresh token claims. Stateless: signed with a separate secret.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshTokenClaims {
    pub sub: String,
    pub jti: String,
    #[serde(rename = "type")]
    pub user_type: UserType,
    pub iat: u64,
    pub exp: u64,
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl AccessTokenClaims {
    pub fn is_expired(&self) -> bool {
        self.exp < now_secs()
    }

    pub fn user_id(&self) -> Result<uuid::Uuid, uuid::Error> {
        uuid::Uuid::parse_str(&self.sub)
    }
}

impl RefreshTokenClaims {
    pub fn is_expired(&self) -> bool {
        self.exp < now_secs()
    }
}

/// Email + password login for one account type
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login where the account type travels in the body
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct TypedLoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[serde(rename = "type")]
    pub user_type: UserType,
}

/// Client self-registration
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterClientRequest {
    #[validate(length(min = 1, max = 255, message = "Username is required"))]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(custom = "validate_password_strength")]
    pub password: String,
    #[validate(length(min = 1, max = 255, message = "Company name is required"))]
    pub company_name: String,
    #[validate(regex(path = "PHONE_REGEX", message = "Invalid phone number"))]
    pub phone_number: String,
    #[validate(regex(path = "SIREN_REGEX", message = "SIREN must contain 9 digits"))]
    pub siren: String,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 255))]
    pub city: Option<String>,
    #[validate(regex(path = "POSTAL_CODE_REGEX", message = "Postal code must contain 5 digits"))]
    pub postal_code: Option<String>,
    pub secteur_activite: Option<String>,
    #[validate(range(min = 0, max = 1000000, message = "Invalid employee count"))]
    pub nombre_employes: Option<i32>,
    #[validate(range(min = 0.0, message = "Revenue cannot be negative"))]
    pub revenu_annuel: Option<f64>,
    #[validate(range(min = 0, max = 500, message = "Invalid company age"))]
    pub anciennete_entreprise: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckSirenRequest {
    pub siren: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SirenAvailability {
    pub siren: String,
    pub available: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(custom = "validate_password_strength")]
    pub new_password: String,
}

/// Profile of whichever account type is logged in
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum AccountProfile {
    Client(Client),
    Expert(Expert),
    Apporteur(Apporteur),
    Admin(Admin),
}

impl AccountProfile {
    pub fn id(&self) -> uuid::Uuid {
        match self {
            AccountProfile::Client(c) => c.id,
            AccountProfile::Expert(e) => e.id,
            AccountProfile::Apporteur(a) => a.id,
            AccountProfile::Admin(a) => a.id,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            AccountProfile::Client(c) => &c.email,
            AccountProfile::Expert(e) => &e.email,
            AccountProfile::Apporteur(a) => &a.email,
            AccountProfile::Admin(a) => &a.email,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    #[serde(rename = "type")]
    pub user_type: UserType,
    pub user: AccountProfile,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub token: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenInfo {
    pub user_id: String,
    pub email: String,
    #[serde(rename = "type")]
    pub user_type: UserType,
    pub expires_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_type_parsing() {
        assert_eq!("client".parse::<UserType>().unwrap(), UserType::Client);
        assert_eq!("EXPERT".parse::<UserType>().unwrap(), UserType::Expert);
        assert_eq!(
            "apporteur_affaires".parse::<UserType>().unwrap(),
            UserType::Apporteur
        );
        assert!("partner".parse::<UserType>().is_err());
    }

    #[test]
    fn test_user_type_serde_alias() {
        let t: UserType = serde_json::from_str("\"apporteur_affaires\"").unwrap();
        assert_eq!(t, UserType::Apporteur);
        assert_eq!(serde_json::to_string(&UserType::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn test_typed_login_accepts_legacy_type() {
        let req: TypedLoginRequest = serde_json::from_value(serde_json::json!({
            "email": "partner@profitum.fr",
            "password": "secret",
            "type": "apporteur_affaires"
        }))
        .unwrap();
        assert_eq!(req.user_type, UserType::Apporteur);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_register_request_validation() {
        let mut req = RegisterClientRequest {
            username: "Jean Dupont".into(),
            email: "jean@transports-dupont.fr".into(),
            password: "Camion2024".into(),
            company_name: "Transports Dupont".into(),
            phone_number: "06 12 34 56 78".into(),
            siren: "123456789".into(),
            address: None,
            city: None,
            postal_code: Some("69001".into()),
            secteur_activite: None,
            nombre_employes: Some(12),
            revenu_annuel: None,
            anciennete_entreprise: None,
        };
        assert!(req.validate().is_ok());

        req.siren = "12345".into();
        req.password = "short".into();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("siren"));
        assert!(errors.field_errors().contains_key("password"));
    }

    #[test]
    fn test_claims_expiry() {
        let claims = RefreshTokenClaims {
            sub: uuid::Uuid::nil().to_string(),
            jti: "j".into(),
            user_type: UserType::Client,
            iat: 0,
            exp: 1,
        };
        assert!(claims.is_expired());
    }
}
