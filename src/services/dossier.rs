// Dossier lifecycle: scoped reads, opening, status transitions, progress and expert assignment

use chrono::Utc;
use diesel::OptionalExtension;
use diesel_async::{scoped_futures::ScopedFutureExt, AsyncConnection, AsyncPgConnection};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    db::DieselPool,
    middleware::auth::AuthenticatedUser,
    models::{
        auth::UserType,
        client::Client,
        common::{Paginated, PaginationQuery},
        dossier::{
            AssignExpertRequest, ClientProduitEligible, CreateDossierRequest, DossierFilter,
            DossierScope, DossierUpdate, DossierView, NewClientProduitEligible,
            UpdateDossierProgressRequest, UpdateDossierStatusRequest,
        },
        dossier_workflow::{DossierTimelineEvent, NewTimelineEvent},
        expert::Expert,
        notification::{kinds, NewNotification},
        produit::ProduitEligible,
        status::{DossierStatut, NotificationPriority, TimelineEventType},
    },
    services::{dossier_workflow::open_workflows, notification::NotificationService},
    utils::{
        audit_logger::{AuditAction, AuditLogger},
        service_error::{OrNotFound, ServiceError, ServiceResult},
    },
};

/// Dossiers an account may list
pub fn scope_for(user: &AuthenticatedUser) -> DossierScope {
    match user.user_type {
        UserType::Client => DossierScope::Client(user.user_id),
        UserType::Expert => DossierScope::Expert(user.user_id),
        UserType::Apporteur => DossierScope::Apporteur(user.user_id),
        UserType::Admin => DossierScope::All,
    }
}

pub fn check_transition(from: DossierStatut, to: DossierStatut) -> ServiceResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(ServiceError::InvalidTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }
}

/// Participants of a dossier: its client, the assigned expert, the client's apporteur, admins
pub async fn ensure_dossier_access(
    conn: &mut AsyncPgConnection,
    user: &AuthenticatedUser,
    dossier: &ClientProduitEligible,
) -> ServiceResult<()> {
    let allowed = match user.user_type {
        UserType::Admin => true,
        UserType::Client => dossier.client_id == user.user_id,
        UserType::Expert => dossier.expert_id == Some(user.user_id),
        UserType::Apporteur => {
            let client = Client::find_by_id(conn, dossier.client_id).await.optional()?;
            client.and_then(|c| c.apporteur_id) == Some(user.user_id)
        },
    };
    if allowed {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "You do not have access to this dossier".to_string(),
        ))
    }
}

/// Assigned expert or admin
pub fn ensure_can_work_on(
    user: &AuthenticatedUser,
    dossier: &ClientProduitEligible,
) -> ServiceResult<()> {
    if user.is_admin() || (user.is(UserType::Expert) && dossier.expert_id == Some(user.user_id)) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "Only the assigned expert or an administrator can update this dossier".to_string(),
        ))
    }
}

pub struct DossierService {
    diesel_pool: DieselPool,
}

impl DossierService {
    pub fn new(state: &AppState) -> Self {
        Self {
            diesel_pool: state.diesel_pool.clone(),
        }
    }

    #[instrument(skip(self, user, filter, page), fields(user_id = %user.user_id))]
    pub async fn list(
        &self,
        user: &AuthenticatedUser,
        filter: &DossierFilter,
        page: &PaginationQuery,
    ) -> ServiceResult<Paginated<DossierView>> {
        let mut conn = self.diesel_pool.get().await?;
        let (items, total) =
            ClientProduitEligible::list_scoped(&mut conn, scope_for(user), filter, page).await?;
        Ok(Paginated::new(items, page, total))
    }

    pub async fn get(&self, user: &AuthenticatedUser, dossier_id: Uuid) -> ServiceResult<DossierView> {
        let mut conn = self.diesel_pool.get().await?;
        let view = ClientProduitEligible::find_view(&mut conn, dossier_id)
            .await
            .or_not_found("Dossier")?;
        ensure_dossier_access(&mut conn, user, &view.dossier).await?;
        Ok(view)
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn create(
        &self,
        user: &AuthenticatedUser,
        request: CreateDossierRequest,
    ) -> ServiceResult<ClientProduitEligible> {
        request.validate()?;

        let client_id = match user.user_type {
            UserType::Client => user.user_id,
            UserType::Admin => request.client_id.ok_or_else(|| {
                ServiceError::ValidationError("client_id is required".to_string())
            })?,
            _ => {
                return Err(ServiceError::Forbidden(
                    "Only clients and administrators can open dossiers".to_string(),
                ))
            },
        };

        let mut conn = self.diesel_pool.get().await?;
        Client::find_by_id(&mut conn, client_id)
            .await
            .or_not_found("Client")?;
        let produit = ProduitEligible::find_by_id(&mut conn, request.produit_id)
            .await
            .or_not_found("Produit")?;
        if !produit.active {
            return Err(ServiceError::ValidationError(format!(
                "Product {} is no longer offered",
                produit.code
            )));
        }
        if ClientProduitEligible::exists_for(&mut conn, client_id, produit.id).await? {
            return Err(ServiceError::Conflict(format!(
                "A dossier for {} already exists for this client",
                produit.code
            )));
        }

        let new_dossier = NewClientProduitEligible {
            client_id,
            produit_id: produit.id,
            expert_id: None,
            statut: DossierStatut::Eligible.as_str().to_string(),
            taux_final: request.taux_final,
            montant_final: request.montant_final,
            duree_finale: request.duree_finale,
            priorite: 2,
            simulation_id: None,
            notes: request.notes,
            metadata: json!({ "opened_by": user.user_type.as_str() }),
            date_eligibilite: Some(Utc::now()),
        };
        let dossier = conn
            .transaction::<_, ServiceError, _>(|conn| {
                async move {
                    let dossier = ClientProduitEligible::create(conn, new_dossier).await?;
                    open_workflows(conn, std::slice::from_ref(&dossier), Some(user)).await?;
                    Ok(dossier)
                }
                .scope_boxed()
            })
            .await?;

        AuditLogger::log_action(
            AuditAction::DossierCreated,
            user.actor(),
            "dossier",
            Some(dossier.id),
            Some(json!({ "client_id": client_id, "produit": produit.code })),
        )
        .await;
        Ok(dossier)
    }

    /// Assigned expert or admin; the client is notified in the same transaction
    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn update_status(
        &self,
        user: &AuthenticatedUser,
        dossier_id: Uuid,
        request: UpdateDossierStatusRequest,
    ) -> ServiceResult<ClientProduitEligible> {
        request.validate()?;
        let mut conn = self.diesel_pool.get().await?;
        let dossier = ClientProduitEligible::find_by_id(&mut conn, dossier_id)
            .await
            .or_not_found("Dossier")?;
        ensure_can_work_on(user, &dossier)?;

        let from = dossier.statut_enum();
        check_transition(from, request.statut)?;

        let produit = ProduitEligible::find_by_id(&mut conn, dossier.produit_id)
            .await
            .or_not_found("Produit")?;
        let to = request.statut;
        let notes = request.notes;

        let updated = conn
            .transaction::<_, ServiceError, _>(|conn| {
                async move {
                    let updated = ClientProduitEligible::update_if_statut(
                        conn,
                        dossier_id,
                        from,
                        DossierUpdate::status(to, notes),
                    )
                    .await?
                    .ok_or_else(|| {
                        ServiceError::Conflict(format!(
                            "Dossier is no longer '{}'; reload it and retry",
                            from.as_str()
                        ))
                    })?;
                    DossierTimelineEvent::create(
                        conn,
                        NewTimelineEvent::by(
                            user,
                            dossier_id,
                            TimelineEventType::StatusChanged,
                            format!("Statut : {} → {}", from.as_str(), to.as_str()),
                        )
                        .metadata(json!({ "from": from.as_str(), "to": to.as_str() })),
                    )
                    .await?;
                    NotificationService::notify(
                        conn,
                        NewNotification::new(
                            updated.client_id,
                            UserType::Client,
                            kinds::DOSSIER_STATUS_CHANGED,
                            format!("Dossier {} mis à jour", produit.nom),
                            format!(
                                "Votre dossier {} est passé au statut « {} ».",
                                produit.nom,
                                to.as_str()
                            ),
                        )
                        .priority(if to.is_final() {
                            NotificationPriority::High
                        } else {
                            NotificationPriority::Medium
                        })
                        .action_url(format!("/dossiers/{}", dossier_id))
                        .metadata(json!({ "dossier_id": dossier_id, "statut": to.as_str() })),
                    )
                    .await?;
                    Ok(updated)
                }
                .scope_boxed()
            })
            .await?;

        AuditLogger::log_action(
            AuditAction::DossierStatusChanged,
            user.actor(),
            "dossier",
            Some(dossier_id),
            Some(json!({ "from": from.as_str(), "to": to.as_str() })),
        )
        .await;
        info!(dossier_id = %dossier_id, from = from.as_str(), to = to.as_str(), "Dossier status changed");
        Ok(updated)
    }

    pub async fn update_progress(
        &self,
        user: &AuthenticatedUser,
        dossier_id: Uuid,
        request: UpdateDossierProgressRequest,
    ) -> ServiceResult<ClientProduitEligible> {
        request.validate()?;
        let mut conn = self.diesel_pool.get().await?;
        let dossier = ClientProduitEligible::find_by_id(&mut conn, dossier_id)
            .await
            .or_not_found("Dossier")?;
        ensure_can_work_on(user, &dossier)?;
        if dossier.statut_enum().is_final() {
            return Err(ServiceError::ValidationError(
                "A closed dossier cannot be updated".to_string(),
            ));
        }

        Ok(ClientProduitEligible::update(
            &mut conn,
            dossier_id,
            DossierUpdate::progress(request.current_step, request.progress, request.montant_final),
        )
        .await?)
    }

    /// Admin or the owning client; only approved, active experts can take a dossier
    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn assign_expert(
        &self,
        user: &AuthenticatedUser,
        dossier_id: Uuid,
        request: AssignExpertRequest,
    ) -> ServiceResult<ClientProduitEligible> {
        let mut conn = self.diesel_pool.get().await?;
        let dossier = ClientProduitEligible::find_by_id(&mut conn, dossier_id)
            .await
            .or_not_found("Dossier")?;
        let allowed = user.is_admin()
            || (user.is(UserType::Client) && dossier.client_id == user.user_id);
        if !allowed {
            return Err(ServiceError::Forbidden(
                "Only the client or an administrator can assign an expert".to_string(),
            ));
        }
        if dossier.statut_enum().is_final() {
            return Err(ServiceError::ValidationError(
                "A closed dossier cannot be reassigned".to_string(),
            ));
        }

        let expert = Expert::find_by_id(&mut conn, request.expert_id)
            .await
            .or_not_found("Expert")?;
        if !expert.is_available() {
            return Err(ServiceError::ValidationError(
                "Expert is not approved or not active".to_string(),
            ));
        }
        let produit = ProduitEligible::find_by_id(&mut conn, dossier.produit_id)
            .await
            .or_not_found("Produit")?;

        let expert_id = expert.id;
        let expert_name = expert.name.clone();
        let updated = conn
            .transaction::<_, ServiceError, _>(|conn| {
                async move {
                    let updated = ClientProduitEligible::update(
                        conn,
                        dossier_id,
                        DossierUpdate::assign_expert(expert_id),
                    )
                    .await?;
                    DossierTimelineEvent::create(
                        conn,
                        NewTimelineEvent::by(
                            user,
                            dossier_id,
                            TimelineEventType::ExpertAssigned,
                            "Expert assigné",
                        )
                        .description(expert_name)
                        .metadata(json!({ "expert_id": expert_id })),
                    )
                    .await?;
                    NotificationService::notify(
                        conn,
                        NewNotification::new(
                            expert_id,
                            UserType::Expert,
                            kinds::DOSSIER_ASSIGNED,
                            "Nouveau dossier assigné",
                            format!("Un dossier {} vous a été assigné.", produit.nom),
                        )
                        .priority(NotificationPriority::High)
                        .action_url(format!("/expert/dossiers/{}", dossier_id))
                        .metadata(json!({ "dossier_id": dossier_id })),
                    )
                    .await?;
                    Ok(updated)
                }
                .scope_boxed()
            })
            .await?;

        AuditLogger::log_action(
            AuditAction::DossierExpertAssigned,
            user.actor(),
            "dossier",
            Some(dossier_id),
            Some(json!({ "expert_id": expert_id })),
        )
        .await;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(user_type: UserType) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: Uuid::new_v4(),
            token_id: "jti".into(),
            email: "user@profitum.fr".into(),
            user_type,
            exp: u64::MAX,
        }
    }

    fn dossier(client_id: Uuid, expert_id: Option<Uuid>) -> ClientProduitEligible {
        ClientProduitEligible {
            id: Uuid::new_v4(),
            client_id,
            produit_id: Uuid::new_v4(),
            expert_id,
            statut: "en_cours".into(),
            taux_final: None,
            montant_final: None,
            duree_finale: None,
            priorite: 2,
            current_step: 0,
            progress: 0,
            simulation_id: None,
            notes: None,
            metadata: json!({}),
            date_eligibilite: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_scope_follows_account_type() {
        let client = user(UserType::Client);
        assert_eq!(scope_for(&client), DossierScope::Client(client.user_id));
        let apporteur = user(UserType::Apporteur);
        assert_eq!(scope_for(&apporteur), DossierScope::Apporteur(apporteur.user_id));
        assert_eq!(scope_for(&user(UserType::Admin)), DossierScope::All);
    }

    #[test]
    fn test_final_states_reject_transitions() {
        assert!(check_transition(DossierStatut::Eligible, DossierStatut::EnCours).is_ok());
        let err = check_transition(DossierStatut::Termine, DossierStatut::EnCours).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition { .. }));
        assert!(check_transition(DossierStatut::EnCours, DossierStatut::EnCours).is_err());
    }

    #[test]
    fn test_only_assigned_expert_can_work() {
        let expert = user(UserType::Expert);
        let assigned = dossier(Uuid::new_v4(), Some(expert.user_id));
        let other = dossier(Uuid::new_v4(), Some(Uuid::new_v4()));

        assert!(ensure_can_work_on(&expert, &assigned).is_ok());
        assert!(ensure_can_work_on(&expert, &other).is_err());
        assert!(ensure_can_work_on(&user(UserType::Admin), &other).is_ok());
        assert!(ensure_can_work_on(&user(UserType::Client), &assigned).is_err());
    }
}
