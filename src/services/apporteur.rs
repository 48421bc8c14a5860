// Apporteurs d'affaires: admin management, self profile, stats and prospect portfolio

use chrono::Utc;
use diesel::OptionalExtension;
use diesel_async::AsyncPgConnection;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    db::DieselPool,
    middleware::auth::AuthenticatedUser,
    models::{
        apporteur::{
            estimate_commission, Apporteur, ApporteurFilter, ApporteurStats, ApporteurUpdate,
            CreateApporteurRequest, CreateProspectRequest, NewApporteur, ProspectCredentials,
            UpdateApporteurRequest, UpdateApporteurStatusRequest, DEFAULT_COMMISSION_RATE,
        },
        client::{
            Client, ClientDetail, ClientFilter, ClientUpdate, NewClient,
            UpdateClientProfileRequest,
        },
        common::{Paginated, PaginationQuery, StatusCounts},
        dossier::ClientProduitEligible,
        status::{ApporteurStatus, ClientSource, ClientStatut, DossierStatut},
    },
    services::client::find_live_client,
    utils::{
        audit_logger::{AuditAction, AuditLogger},
        password::{generate_temporary_password, hash_password},
        service_error::{OrNotFound, ServiceError, ServiceResult},
        validation::{normalize_siren, trim_optional_field},
    },
};

/// A prospect belongs to the apporteur who registered it
pub fn ensure_owns_prospect(apporteur_id: Uuid, client: &Client) -> ServiceResult<()> {
    if client.apporteur_id == Some(apporteur_id) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "This prospect belongs to another apporteur".to_string(),
        ))
    }
}

pub struct ApporteurService {
    diesel_pool: DieselPool,
    temporary_password_length: usize,
}

impl ApporteurService {
    pub fn new(state: &AppState) -> Self {
        Self {
            diesel_pool: state.diesel_pool.clone(),
            temporary_password_length: state.config.security.temporary_password_length,
        }
    }

    // Admin

    pub async fn list(
        &self,
        filter: &ApporteurFilter,
        page: &PaginationQuery,
    ) -> ServiceResult<Paginated<Apporteur>> {
        let mut conn = self.diesel_pool.get().await?;
        let (items, total) = Apporteur::list(&mut conn, filter, page).await?;
        Ok(Paginated::new(items, page, total))
    }

    pub async fn get(&self, apporteur_id: Uuid) -> ServiceResult<Apporteur> {
        let mut conn = self.diesel_pool.get().await?;
        Ok(Apporteur::find_by_id(&mut conn, apporteur_id)
            .await
            .or_not_found("Apporteur")?)
    }

    #[instrument(skip(self, admin, request), fields(email = %request.email))]
    pub async fn create(
        &self,
        admin: &AuthenticatedUser,
        request: CreateApporteurRequest,
    ) -> ServiceResult<Apporteur> {
        let mut request = request;
        request.siren = request.siren.as_deref().map(normalize_siren);
        request.validate()?;

        let email = request.email.trim().to_lowercase();
        let mut conn = self.diesel_pool.get().await?;
        if Apporteur::find_by_email(&mut conn, &email)
            .await
            .optional()?
            .is_some()
        {
            return Err(ServiceError::Conflict(
                "An apporteur already exists for this email".to_string(),
            ));
        }

        let apporteur = Apporteur::create(
            &mut conn,
            NewApporteur {
                email,
                password_hash: hash_password(&request.password)?,
                first_name: request.first_name.trim().to_string(),
                last_name: request.last_name.trim().to_string(),
                company_name: trim_optional_field(request.company_name.as_ref()),
                phone_number: trim_optional_field(request.phone_number.as_ref()),
                siren: request.siren,
                commission_rate: request.commission_rate.unwrap_or(DEFAULT_COMMISSION_RATE),
                status: request
                    .status
                    .unwrap_or(ApporteurStatus::Active)
                    .as_str()
                    .to_string(),
            },
        )
        .await?;

        AuditLogger::log_action(
            AuditAction::AccountCreated,
            admin.actor(),
            "apporteur",
            Some(apporteur.id),
            None,
        )
        .await;
        info!(apporteur_id = %apporteur.id, "Apporteur created");
        Ok(apporteur)
    }

    pub async fn update(
        &self,
        admin: &AuthenticatedUser,
        apporteur_id: Uuid,
        request: UpdateApporteurRequest,
    ) -> ServiceResult<Apporteur> {
        self.apply_update(admin, apporteur_id, request, true).await
    }

    #[instrument(skip(self, admin, request))]
    pub async fn set_status(
        &self,
        admin: &AuthenticatedUser,
        apporteur_id: Uuid,
        request: UpdateApporteurStatusRequest,
    ) -> ServiceResult<Apporteur> {
        let mut conn = self.diesel_pool.get().await?;
        let current = Apporteur::find_by_id(&mut conn, apporteur_id)
            .await
            .or_not_found("Apporteur")?;
        let apporteur = Apporteur::update(
            &mut conn,
            apporteur_id,
            ApporteurUpdate {
                status: Some(request.status.as_str().to_string()),
                updated_at: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await?;

        AuditLogger::log_action(
            AuditAction::AccountStatusChanged,
            admin.actor(),
            "apporteur",
            Some(apporteur.id),
            Some(json!({ "from": current.status, "to": apporteur.status })),
        )
        .await;
        Ok(apporteur)
    }

    #[instrument(skip(self, admin))]
    pub async fn delete(
        &self,
        admin: &AuthenticatedUser,
        apporteur_id: Uuid,
    ) -> ServiceResult<()> {
        let mut conn = self.diesel_pool.get().await?;
        let now = Utc::now();
        Apporteur::update(
            &mut conn,
            apporteur_id,
            ApporteurUpdate {
                status: Some(ApporteurStatus::Inactive.as_str().to_string()),
                deleted_at: Some(Some(now)),
                updated_at: Some(now),
                ..Default::default()
            },
        )
        .await
        .or_not_found("Apporteur")?;

        AuditLogger::log_action(
            AuditAction::AccountDeleted,
            admin.actor(),
            "apporteur",
            Some(apporteur_id),
            None,
        )
        .await;
        Ok(())
    }

    pub async fn counts(&self) -> ServiceResult<StatusCounts> {
        let mut conn = self.diesel_pool.get().await?;
        Ok(StatusCounts::from_counts(
            Apporteur::count_by_status(&mut conn).await?,
        ))
    }

    // Self

    pub async fn profile(&self, user: &AuthenticatedUser) -> ServiceResult<Apporteur> {
        self.get(user.user_id).await
    }

    pub async fn update_profile(
        &self,
        user: &AuthenticatedUser,
        request: UpdateApporteurRequest,
    ) -> ServiceResult<Apporteur> {
        self.apply_update(user, user.user_id, request, false).await
    }

    async fn apply_update(
        &self,
        actor: &AuthenticatedUser,
        apporteur_id: Uuid,
        request: UpdateApporteurRequest,
        privileged: bool,
    ) -> ServiceResult<Apporteur> {
        let mut request = request;
        request.siren = request.siren.as_deref().map(normalize_siren);
        request.validate()?;

        let mut conn = self.diesel_pool.get().await?;
        let apporteur =
            Apporteur::update(&mut conn, apporteur_id, request.into_changeset(privileged))
                .await
                .or_not_found("Apporteur")?;

        AuditLogger::log_action(
            AuditAction::AccountUpdated,
            actor.actor(),
            "apporteur",
            Some(apporteur.id),
            None,
        )
        .await;
        Ok(apporteur)
    }

    /// Portfolio figures; commission is estimated on completed dossiers only
    pub async fn stats(&self, user: &AuthenticatedUser) -> ServiceResult<ApporteurStats> {
        let mut conn = self.diesel_pool.get().await?;
        let apporteur = Apporteur::find_by_id(&mut conn, user.user_id)
            .await
            .or_not_found("Apporteur")?;

        let prospects = Client::count_by_statut(&mut conn, Some(apporteur.id)).await?;
        let dossiers =
            ClientProduitEligible::count_by_statut(&mut conn, Some(apporteur.id)).await?;
        let completed_amount = ClientProduitEligible::total_amount(
            &mut conn,
            Some(DossierStatut::Termine),
            Some(apporteur.id),
        )
        .await?;

        let estimated_commission = estimate_commission(completed_amount, apporteur.commission_rate);
        Ok(ApporteurStats {
            prospects: StatusCounts::from_counts(prospects),
            dossiers: StatusCounts::from_counts(dossiers),
            completed_amount,
            commission_rate: apporteur.commission_rate,
            estimated_commission,
        })
    }

    // Prospects

    async fn owned_prospect(
        conn: &mut AsyncPgConnection,
        user: &AuthenticatedUser,
        client_id: Uuid,
    ) -> ServiceResult<Client> {
        let client = find_live_client(conn, client_id).await?;
        ensure_owns_prospect(user.user_id, &client)?;
        Ok(client)
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn create_prospect(
        &self,
        user: &AuthenticatedUser,
        request: CreateProspectRequest,
    ) -> ServiceResult<Client> {
        let mut request = request;
        request.siren = request.siren.as_deref().map(normalize_siren);
        request.validate()?;

        let email = request.email.trim().to_lowercase();
        let mut conn = self.diesel_pool.get().await?;
        if Client::email_exists(&mut conn, &email).await? {
            return Err(ServiceError::Conflict(
                "A client already exists for this email".to_string(),
            ));
        }

        let client = Client::create(
            &mut conn,
            NewClient {
                email,
                password_hash: None,
                username: request.username.trim().to_string(),
                company_name: Some(request.company_name.trim().to_string()),
                phone_number: trim_optional_field(request.phone_number.as_ref()),
                address: trim_optional_field(request.address.as_ref()),
                city: trim_optional_field(request.city.as_ref()),
                postal_code: trim_optional_field(request.postal_code.as_ref()),
                siren: request.siren,
                secteur_activite: trim_optional_field(request.secteur_activite.as_ref()),
                nombre_employes: request.nombre_employes,
                revenu_annuel: request.revenu_annuel,
                anciennete_entreprise: None,
                statut: ClientStatut::Prospect.as_str().to_string(),
                source: ClientSource::Apporteur.as_str().to_string(),
                apporteur_id: Some(user.user_id),
                metadata: json!({ "notes": request.notes }),
            },
        )
        .await?;

        AuditLogger::log_action(
            AuditAction::ProspectCreated,
            user.actor(),
            "client",
            Some(client.id),
            None,
        )
        .await;
        info!(client_id = %client.id, "Prospect registered");
        Ok(client)
    }

    pub async fn list_prospects(
        &self,
        user: &AuthenticatedUser,
        filter: &ClientFilter,
        page: &PaginationQuery,
    ) -> ServiceResult<Paginated<Client>> {
        let filter = ClientFilter {
            apporteur_id: Some(user.user_id),
            ..filter.clone()
        };
        let mut conn = self.diesel_pool.get().await?;
        let (items, total) = Client::list(&mut conn, &filter, page).await?;
        Ok(Paginated::new(items, page, total))
    }

    pub async fn get_prospect(
        &self,
        user: &AuthenticatedUser,
        client_id: Uuid,
    ) -> ServiceResult<ClientDetail> {
        let mut conn = self.diesel_pool.get().await?;
        let client = Self::owned_prospect(&mut conn, user, client_id).await?;
        let dossiers = ClientProduitEligible::list_for_client(&mut conn, client.id).await?;
        Ok(ClientDetail { client, dossiers })
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn update_prospect(
        &self,
        user: &AuthenticatedUser,
        client_id: Uuid,
        request: UpdateClientProfileRequest,
    ) -> ServiceResult<Client> {
        let mut request = request;
        request.siren = request.siren.as_deref().map(normalize_siren);
        request.validate()?;

        let mut conn = self.diesel_pool.get().await?;
        let client = Self::owned_prospect(&mut conn, user, client_id).await?;
        Ok(Client::update(&mut conn, client.id, request.into_changeset()).await?)
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn delete_prospect(
        &self,
        user: &AuthenticatedUser,
        client_id: Uuid,
    ) -> ServiceResult<()> {
        let mut conn = self.diesel_pool.get().await?;
        let client = Self::owned_prospect(&mut conn, user, client_id).await?;
        Client::soft_delete(&mut conn, client.id).await?;

        AuditLogger::log_action(
            AuditAction::AccountDeleted,
            user.actor(),
            "client",
            Some(client.id),
            None,
        )
        .await;
        Ok(())
    }

    /// Prospect becomes an active client
    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn convert_prospect(
        &self,
        user: &AuthenticatedUser,
        client_id: Uuid,
    ) -> ServiceResult<Client> {
        let mut conn = self.diesel_pool.get().await?;
        let client = Self::owned_prospect(&mut conn, user, client_id).await?;
        if client.statut_enum() != ClientStatut::Prospect {
            return Err(ServiceError::ValidationError(format!(
                "Only prospects can be converted (current statut: {})",
                client.statut
            )));
        }

        let converted = Client::update(
            &mut conn,
            client.id,
            ClientUpdate {
                statut: Some(ClientStatut::Actif.as_str().to_string()),
                updated_at: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await?;

        AuditLogger::log_action(
            AuditAction::ProspectConverted,
            user.actor(),
            "client",
            Some(converted.id),
            None,
        )
        .await;
        info!(client_id = %converted.id, "Prospect converted to client");
        Ok(converted)
    }

    /// Only the hash is stored; the clear password is returned once to the apporteur
    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn issue_credentials(
        &self,
        user: &AuthenticatedUser,
        client_id: Uuid,
    ) -> ServiceResult<ProspectCredentials> {
        let mut conn = self.diesel_pool.get().await?;
        let client = Self::owned_prospect(&mut conn, user, client_id).await?;

        let temporary_password = generate_temporary_password(self.temporary_password_length);
        Client::update(
            &mut conn,
            client.id,
            ClientUpdate {
                password_hash: Some(Some(hash_password(&temporary_password)?)),
                updated_at: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await?;

        AuditLogger::log_action(
            AuditAction::CredentialsIssued,
            user.actor(),
            "client",
            Some(client.id),
            None,
        )
        .await;
        Ok(ProspectCredentials {
            client_id: client.id,
            email: client.email,
            temporary_password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prospect(apporteur_id: Option<Uuid>) -> Client {
        Client {
            id: Uuid::new_v4(),
            email: "contact@boulangerie-petit.fr".to_string(),
            password_hash: None,
            username: "Petit".to_string(),
            company_name: Some("Boulangerie Petit".to_string()),
            phone_number: None,
            address: None,
            city: None,
            postal_code: None,
            siren: None,
            secteur_activite: Some("Commerce".to_string()),
            nombre_employes: Some(4),
            revenu_annuel: None,
            anciennete_entreprise: None,
            statut: "prospect".to_string(),
            source: "apporteur".to_string(),
            apporteur_id,
            metadata: json!({}),
            derniere_connexion: None,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_prospect_ownership() {
        let me = Uuid::new_v4();
        assert!(ensure_owns_prospect(me, &prospect(Some(me))).is_ok());
        assert!(matches!(
            ensure_owns_prospect(me, &prospect(Some(Uuid::new_v4()))),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(ensure_owns_prospect(me, &prospect(None)).is_err());
    }
}
