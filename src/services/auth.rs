// Authentication for the four account types: login, registration, tokens, passwords

use std::sync::Arc;

use chrono::Utc;
use diesel::OptionalExtension;
use diesel_async::AsyncPgConnection;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    db::DieselPool,
    middleware::auth::AuthenticatedUser,
    models::{
        admin::Admin,
        apporteur::{Apporteur, ApporteurUpdate},
        auth::{
            AccountProfile, ChangePasswordRequest, LoginResponse, RefreshResponse,
            RegisterClientRequest, SirenAvailability, UserType,
        },
        client::{Client, ClientUpdate, NewClient},
        expert::{Expert, ExpertUpdate},
        status::{ApporteurStatus, ApprovalStatus, ClientSource, ClientStatut, ExpertStatus},
    },
    services::jwt::JwtService,
    utils::{
        audit_logger::{AuditAction, AuditLogger},
        auth_errors::{log_auth_failure, AuthError},
        password::{hash_password, needs_rehash, verify_password},
        validation::{is_valid_siren, normalize_siren, trim_optional_field},
    },
};

/// Whether an account in this state may open a session
pub fn check_login_status(profile: &AccountProfile) -> Result<(), AuthError> {
    match profile {
        AccountProfile::Client(client) => {
            if client.statut_enum().can_login() {
                Ok(())
            } else {
                Err(AuthError::AccountInactive)
            }
        },
        AccountProfile::Expert(expert) => {
            if expert.approval_enum() != ApprovalStatus::Approved {
                return Err(AuthError::ExpertNotApproved(expert.approval_status.clone()));
            }
            if expert.status_enum() != ExpertStatus::Active {
                return Err(AuthError::AccountInactive);
            }
            Ok(())
        },
        AccountProfile::Apporteur(apporteur) => {
            if apporteur.status_enum() == ApporteurStatus::Active {
                Ok(())
            } else {
                Err(AuthError::AccountInactive)
            }
        },
        AccountProfile::Admin(admin) => {
            if admin.is_active {
                Ok(())
            } else {
                Err(AuthError::AccountInactive)
            }
        },
    }
}

fn stored_hash(profile: &AccountProfile) -> Option<&str> {
    match profile {
        AccountProfile::Client(c) => c.password_hash.as_deref(),
        AccountProfile::Expert(e) => Some(e.password_hash.as_str()),
        AccountProfile::Apporteur(a) => Some(a.password_hash.as_str()),
        AccountProfile::Admin(a) => Some(a.password_hash.as_str()),
    }
}

pub struct AuthService {
    diesel_pool: DieselPool,
    jwt_service: Arc<JwtService>,
}

impl AuthService {
    pub fn new(state: &AppState) -> Self {
        Self {
            diesel_pool: state.diesel_pool.clone(),
            jwt_service: state.jwt_service.clone(),
        }
    }

    async fn find_account(
        conn: &mut AsyncPgConnection,
        user_type: UserType,
        email: &str,
    ) -> Result<Option<AccountProfile>, AuthError> {
        let profile = match user_type {
            UserType::Client => Client::find_by_email(conn, email)
                .await
                .optional()?
                .map(AccountProfile::Client),
            UserType::Expert => Expert::find_by_email(conn, email)
                .await
                .optional()?
                .map(AccountProfile::Expert),
            UserType::Apporteur => Apporteur::find_by_email(conn, email)
                .await
                .optional()?
                .map(AccountProfile::Apporteur),
            UserType::Admin => Admin::find_by_email(conn, email)
                .await
                .optional()?
                .map(AccountProfile::Admin),
        };
        Ok(profile)
    }

    async fn find_profile(
        conn: &mut AsyncPgConnection,
        user_type: UserType,
        id: Uuid,
    ) -> Result<AccountProfile, AuthError> {
        let profile = match user_type {
            UserType::Client => AccountProfile::Client(Client::find_by_id(conn, id).await?),
            UserType::Expert => AccountProfile::Expert(Expert::find_by_id(conn, id).await?),
            UserType::Apporteur => {
                AccountProfile::Apporteur(Apporteur::find_by_id(conn, id).await?)
            },
            UserType::Admin => AccountProfile::Admin(Admin::find_by_id(conn, id).await?),
        };
        Ok(profile)
    }

    async fn store_password_hash(
        conn: &mut AsyncPgConnection,
        user_type: UserType,
        id: Uuid,
        hash: String,
    ) -> Result<(), AuthError> {
        let now = Utc::now();
        match user_type {
            UserType::Client => {
                Client::update(
                    conn,
                    id,
                    ClientUpdate {
                        password_hash: Some(Some(hash)),
                        updated_at: Some(now),
                        ..Default::default()
                    },
                )
                .await?;
            },
            UserType::Expert => {
                Expert::update(
                    conn,
                    id,
                    ExpertUpdate {
                        password_hash: Some(hash),
                        updated_at: Some(now),
                        ..Default::default()
                    },
                )
                .await?;
            },
            UserType::Apporteur => {
                Apporteur::update(
                    conn,
                    id,
                    ApporteurUpdate {
                        password_hash: Some(hash),
                        updated_at: Some(now),
                        ..Default::default()
                    },
                )
                .await?;
            },
            UserType::Admin => {
                Admin::update_password(conn, id, &hash).await?;
            },
        }
        Ok(())
    }

    async fn record_login(
        conn: &mut AsyncPgConnection,
        user_type: UserType,
        id: Uuid,
    ) -> Result<(), AuthError> {
        match user_type {
            UserType::Client => Client::record_login(conn, id).await?,
            UserType::Expert => Expert::record_login(conn, id).await?,
            UserType::Apporteur => Apporteur::record_login(conn, id).await?,
            UserType::Admin => Admin::record_login(conn, id).await?,
        };
        Ok(())
    }

    fn issue_tokens(
        &self,
        user_type: UserType,
        profile: AccountProfile,
    ) -> Result<LoginResponse, AuthError> {
        let pair = self
            .jwt_service
            .generate_token_pair(profile.id(), profile.email(), user_type)?;
        Ok(LoginResponse {
            token: pair.token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
            user_type,
            user: profile,
        })
    }

    #[instrument(skip(self, password, user_agent), fields(user_type = %user_type))]
    pub async fn login(
        &self,
        user_type: UserType,
        email: &str,
        password: &str,
        user_agent: Option<&str>,
    ) -> Result<LoginResponse, AuthError> {
        let mut conn = self.diesel_pool.get().await?;

        let profile = match Self::find_account(&mut conn, user_type, email).await? {
            Some(profile) => profile,
            // Same answer whether the email is unknown or held by another account type
            None => {
                let error = AuthError::InvalidCredentials;
                log_auth_failure(email, user_type.as_str(), &error, user_agent);
                return Err(error);
            },
        };

        let hash = match stored_hash(&profile) {
            Some(hash) => hash.to_string(),
            None => {
                let error = AuthError::InvalidCredentials;
                log_auth_failure(email, user_type.as_str(), &error, user_agent);
                return Err(error);
            },
        };

        if !verify_password(password, &hash)? {
            let error = AuthError::InvalidCredentials;
            log_auth_failure(email, user_type.as_str(), &error, user_agent);
            return Err(error);
        }

        if let Err(error) = check_login_status(&profile) {
            log_auth_failure(email, user_type.as_str(), &error, user_agent);
            return Err(error);
        }

        if needs_rehash(&hash) {
            let upgraded = hash_password(password)?;
            Self::store_password_hash(&mut conn, user_type, profile.id(), upgraded).await?;
            info!(user_id = %profile.id(), "Upgraded legacy password hash");
        }

        Self::record_login(&mut conn, user_type, profile.id()).await?;
        info!(user_id = %profile.id(), "Login successful");

        self.issue_tokens(user_type, profile)
    }

    #[instrument(skip(self, request))]
    pub async fn register_client(
        &self,
        request: RegisterClientRequest,
    ) -> Result<LoginResponse, AuthError> {
        let mut request = request;
        request.siren = normalize_siren(&request.siren);
        request.validate()?;

        let email = request.email.trim().to_lowercase();
        let mut conn = self.diesel_pool.get().await?;

        if Client::email_exists(&mut conn, &email).await? {
            return Err(AuthError::EmailTaken);
        }
        if Client::siren_exists(&mut conn, &request.siren).await? {
            return Err(AuthError::ValidationError(
                "A company with this SIREN is already registered".to_string(),
            ));
        }

        let new_client = NewClient {
            email,
            password_hash: Some(hash_password(&request.password)?),
            username: request.username.trim().to_string(),
            company_name: Some(request.company_name.trim().to_string()),
            phone_number: Some(request.phone_number.trim().to_string()),
            address: trim_optional_field(request.address.as_ref()),
            city: trim_optional_field(request.city.as_ref()),
            postal_code: trim_optional_field(request.postal_code.as_ref()),
            siren: Some(request.siren.clone()),
            secteur_activite: trim_optional_field(request.secteur_activite.as_ref()),
            nombre_employes: request.nombre_employes,
            revenu_annuel: request.revenu_annuel,
            anciennete_entreprise: request.anciennete_entreprise,
            statut: ClientStatut::Actif.as_str().to_string(),
            source: ClientSource::Direct.as_str().to_string(),
            apporteur_id: None,
            metadata: json!({}),
        };

        let client = Client::create(&mut conn, new_client).await.map_err(|e| match e {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => AuthError::EmailTaken,
            other => other.into(),
        })?;

        AuditLogger::log_action(
            AuditAction::AccountRegistered,
            Some((client.id, UserType::Client.as_str())),
            "client",
            Some(client.id),
            None,
        )
        .await;
        info!(client_id = %client.id, "Client registered");

        self.issue_tokens(UserType::Client, AccountProfile::Client(client))
    }

    pub async fn check_siren(&self, siren: &str) -> Result<SirenAvailability, AuthError> {
        let siren = normalize_siren(siren);
        if !is_valid_siren(&siren) {
            return Err(AuthError::ValidationError(
                "SIREN must contain 9 digits".to_string(),
            ));
        }
        let mut conn = self.diesel_pool.get().await?;
        let taken = Client::siren_exists(&mut conn, &siren).await?;
        Ok(SirenAvailability {
            siren,
            available: !taken,
        })
    }

    /// New access token from a refresh token; the account must still be allowed to log in
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, AuthError> {
        let claims = self.jwt_service.validate_refresh_token(refresh_token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        let mut conn = self.diesel_pool.get().await?;
        let profile = Self::find_profile(&mut conn, claims.user_type, user_id)
            .await
            .map_err(|e| match e {
                AuthError::UserNotFound => AuthError::InvalidToken,
                other => other,
            })?;
        check_login_status(&profile)?;

        let token = self.jwt_service.generate_access_token(
            user_id,
            profile.email(),
            claims.user_type,
        )?;
        Ok(RefreshResponse {
            token,
            expires_in: self.jwt_service.access_token_expiry(),
        })
    }

    pub async fn current_profile(&self, user: &AuthenticatedUser) -> Result<AccountProfile, AuthError> {
        let mut conn = self.diesel_pool.get().await?;
        Self::find_profile(&mut conn, user.user_type, user.user_id).await
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn change_password(
        &self,
        user: &AuthenticatedUser,
        request: ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        request.validate()?;
        if request.current_password == request.new_password {
            return Err(AuthError::ValidationError(
                "New password must differ from the current one".to_string(),
            ));
        }

        let mut conn = self.diesel_pool.get().await?;
        let profile = Self::find_profile(&mut conn, user.user_type, user.user_id).await?;
        let current_ok = match stored_hash(&profile) {
            Some(hash) => verify_password(&request.current_password, hash)?,
            None => false,
        };
        if !current_ok {
            warn!(user_id = %user.user_id, "Password change with wrong current password");
            return Err(AuthError::InvalidCredentials);
        }

        let new_hash = hash_password(&request.new_password)?;
        Self::store_password_hash(&mut conn, user.user_type, user.user_id, new_hash).await?;

        AuditLogger::log_action(
            AuditAction::PasswordChanged,
            user.actor(),
            user.user_type.as_str(),
            Some(user.user_id),
            None,
        )
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn client(statut: ClientStatut) -> Client {
        Client {
            id: Uuid::new_v4(),
            email: "contact@boulangerie.fr".into(),
            password_hash: None,
            username: "Marie".into(),
            company_name: None,
            phone_number: None,
            address: None,
            city: None,
            postal_code: None,
            siren: None,
            secteur_activite: None,
            nombre_employes: None,
            revenu_annuel: None,
            anciennete_entreprise: None,
            statut: statut.as_str().into(),
            source: "direct".into(),
            apporteur_id: None,
            metadata: json!({}),
            derniere_connexion: None,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn admin(is_active: bool) -> Admin {
        Admin {
            id: Uuid::new_v4(),
            email: "admin@profitum.fr".into(),
            password_hash: "x".into(),
            name: "Admin".into(),
            role: "admin".into(),
            is_active,
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_client_login_states() {
        assert!(check_login_status(&AccountProfile::Client(client(ClientStatut::Actif))).is_ok());
        assert!(
            check_login_status(&AccountProfile::Client(client(ClientStatut::EnAttente))).is_ok()
        );
        assert!(matches!(
            check_login_status(&AccountProfile::Client(client(ClientStatut::Prospect))),
            Err(AuthError::AccountInactive)
        ));
        assert!(matches!(
            check_login_status(&AccountProfile::Client(client(ClientStatut::Suspendu))),
            Err(AuthError::AccountInactive)
        ));
    }

    #[test]
    fn test_admin_login_requires_active_flag() {
        assert!(check_login_status(&AccountProfile::Admin(admin(true))).is_ok());
        assert!(check_login_status(&AccountProfile::Admin(admin(false))).is_err());
    }

    #[test]
    fn test_prospect_without_password_has_no_hash() {
        let profile = AccountProfile::Client(client(ClientStatut::Prospect));
        assert!(stored_hash(&profile).is_none());
    }
}
