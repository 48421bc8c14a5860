// Client accounts: self-service profile and admin management

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
        client::{
            Client, ClientDetail, ClientFilter, ClientUpdate, CreateClientRequest,
            CreatedClient, NewClient, UpdateClientProfileRequest, UpdateClientStatusRequest,
        },
        common::{Paginated, PaginationQuery, StatusCounts},
        dossier::ClientProduitEligible,
        status::{ClientSource, ClientStatut},
    },
    utils::{
        audit_logger::{AuditAction, AuditLogger},
        password::{generate_temporary_password, hash_password},
        service_error::{OrNotFound, ServiceError, ServiceResult},
        validation::{normalize_siren, trim_optional_field},
    },
};

/// Soft-deleted clients are treated as missing
pub async fn find_live_client(
    conn: &mut AsyncPgConnection,
    client_id: Uuid,
) -> ServiceResult<Client> {
    let client = Client::find_by_id(conn, client_id)
        .await
        .or_not_found("Client")?;
    if client.is_deleted() {
        return Err(ServiceError::NotFound("Client"));
    }
    Ok(client)
}

pub struct ClientService {
    diesel_pool: DieselPool,
    temporary_password_length: usize,
}

impl ClientService {
    pub fn new(state: &AppState) -> Self {
        Self {
            diesel_pool: state.diesel_pool.clone(),
            temporary_password_length: state.config.security.temporary_password_length,
        }
    }

    pub async fn profile(&self, user: &AuthenticatedUser) -> ServiceResult<Client> {
        let mut conn = self.diesel_pool.get().await?;
        find_live_client(&mut conn, user.user_id).await
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn update_profile(
        &self,
        user: &AuthenticatedUser,
        request: UpdateClientProfileRequest,
    ) -> ServiceResult<Client> {
        let mut request = request;
        request.siren = request.siren.as_deref().map(normalize_siren);
        request.validate()?;

        let mut conn = self.diesel_pool.get().await?;
        let current = find_live_client(&mut conn, user.user_id).await?;
        if let Some(siren) = request.siren.as_deref() {
            let changed = current.siren.as_deref() != Some(siren);
            if changed && Client::siren_exists(&mut conn, siren).await? {
                return Err(ServiceError::Conflict(
                    "This SIREN is already registered".to_string(),
                ));
            }
        }

        let client = Client::update(&mut conn, current.id, request.into_changeset()).await?;
        AuditLogger::log_action(
            AuditAction::AccountUpdated,
            user.actor(),
            "client",
            Some(client.id),
            None,
        )
        .await;
        Ok(client)
    }

    pub async fn list(
        &self,
        filter: &ClientFilter,
        page: &PaginationQuery,
    ) -> ServiceResult<Paginated<Client>> {
        let mut conn = self.diesel_pool.get().await?;
        let (items, total) = Client::list(&mut conn, filter, page).await?;
        Ok(Paginated::new(items, page, total))
    }

    pub async fn get(&self, client_id: Uuid) -> ServiceResult<ClientDetail> {
        let mut conn = self.diesel_pool.get().await?;
        let client = find_live_client(&mut conn, client_id).await?;
        let dossiers = ClientProduitEligible::list_for_client(&mut conn, client.id).await?;
        Ok(ClientDetail { client, dossiers })
    }

    #[instrument(skip(self, admin, request), fields(email = %request.email))]
    pub async fn create(
        &self,
        admin: &AuthenticatedUser,
        request: CreateClientRequest,
    ) -> ServiceResult<CreatedClient> {
        let mut request = request;
        request.siren = request.siren.as_deref().map(normalize_siren);
        request.validate()?;

        let email = request.email.trim().to_lowercase();
        let mut conn = self.diesel_pool.get().await?;
        if Client::email_exists(&mut conn, &email).await? {
            return Err(ServiceError::Conflict(
                "An account already exists for this email".to_string(),
            ));
        }

        let (password, temporary_password) = match request.password {
            Some(password) => (password, None),
            None => {
                let generated = generate_temporary_password(self.temporary_password_length);
                (generated.clone(), Some(generated))
            },
        };
        let password_hash = hash_password(&password)?;

        let new_client = NewClient {
            email,
            password_hash: Some(password_hash),
            username: request.username.trim().to_string(),
            company_name: trim_optional_field(request.company_name.as_ref()),
            phone_number: trim_optional_field(request.phone_number.as_ref()),
            address: trim_optional_field(request.address.as_ref()),
            city: trim_optional_field(request.city.as_ref()),
            postal_code: trim_optional_field(request.postal_code.as_ref()),
            siren: request.siren,
            secteur_activite: trim_optional_field(request.secteur_activite.as_ref()),
            nombre_employes: request.nombre_employes,
            revenu_annuel: None,
            anciennete_entreprise: None,
            statut: request
                .statut
                .unwrap_or(ClientStatut::Actif)
                .as_str()
                .to_string(),
            source: ClientSource::Admin.as_str().to_string(),
            apporteur_id: request.apporteur_id,
            metadata: json!({ "created_by": admin.user_id }),
        };
        let client = Client::create(&mut conn, new_client).await?;

        AuditLogger::log_action(
            AuditAction::AccountCreated,
            admin.actor(),
            "client",
            Some(client.id),
            Some(json!({ "temporary_password": temporary_password.is_some() })),
        )
        .await;
        info!(client_id = %client.id, "Client created by admin");
        Ok(CreatedClient {
            client,
            temporary_password,
        })
    }

    #[instrument(skip(self, admin, request))]
    pub async fn update_status(
        &self,
        admin: &AuthenticatedUser,
        client_id: Uuid,
        request: UpdateClientStatusRequest,
    ) -> ServiceResult<Client> {
        request.validate()?;
        let mut conn = self.diesel_pool.get().await?;
        let current = find_live_client(&mut conn, client_id).await?;
        let client = Client::update(
            &mut conn,
            current.id,
            ClientUpdate {
                statut: Some(request.statut.as_str().to_string()),
                updated_at: Some(chrono::Utc::now()),
                ..Default::default()
            },
        )
        .await?;

        AuditLogger::log_action(
            AuditAction::AccountStatusChanged,
            admin.actor(),
            "client",
            Some(client.id),
            Some(json!({
                "from": current.statut,
                "to": client.statut,
                "reason": request.reason,
            })),
        )
        .await;
        Ok(client)
    }

    #[instrument(skip(self, admin))]
    pub async fn delete(&self, admin: &AuthenticatedUser, client_id: Uuid) -> ServiceResult<()> {
        let mut conn = self.diesel_pool.get().await?;
        let client = find_live_client(&mut conn, client_id).await?;
        Client::soft_delete(&mut conn, client.id).await?;

        AuditLogger::log_action(
            AuditAction::AccountDeleted,
            admin.actor(),
            "client",
            Some(client.id),
            None,
        )
        .await;
        info!(client_id = %client.id, "Client soft-deleted");
        Ok(())
    }

    pub async fn stats(&self) -> ServiceResult<StatusCounts> {
        let mut conn = self.diesel_pool.get().await?;
        let counts = Client::count_by_statut(&mut conn, None).await?;
        Ok(StatusCounts::from_counts(counts))
    }
}
