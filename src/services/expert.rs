// Expert marketplace, self profile and admin moderation

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
        common::{Paginated, PaginationQuery, StatusCounts},
        dossier::{ClientProduitEligible, DossierFilter, DossierScope, DossierView},
        expert::{
            CreateExpertRequest, Expert, ExpertFilter, ExpertPublic, ExpertUpdate, NewExpert,
            RejectExpertRequest, UpdateExpertRequest,
        },
        notification::{kinds, NewNotification},
        status::{ApprovalStatus, ExpertStatus, NotificationPriority},
    },
    services::notification::NotificationService,
    utils::{
        audit_logger::{AuditAction, AuditLogger},
        password::hash_password,
        service_error::{OrNotFound, ServiceError, ServiceResult},
        validation::{normalize_siren, trim_optional_field},
    },
};

/// Changeset for a moderation decision
pub fn approval_update(
    decision: ApprovalStatus,
    admin_id: Uuid,
    reason: Option<String>,
) -> ExpertUpdate {
    let now = Utc::now();
    match decision {
        ApprovalStatus::Approved => ExpertUpdate {
            approval_status: Some(decision.as_str().to_string()),
            status: Some(ExpertStatus::Active.as_str().to_string()),
            approved_at: Some(Some(now)),
            approved_by: Some(Some(admin_id)),
            rejection_reason: Some(None),
            updated_at: Some(now),
            ..Default::default()
        },
        ApprovalStatus::Rejected => ExpertUpdate {
            approval_status: Some(decision.as_str().to_string()),
            status: Some(ExpertStatus::Inactive.as_str().to_string()),
            approved_at: Some(None),
            approved_by: Some(None),
            rejection_reason: Some(reason),
            updated_at: Some(now),
            ..Default::default()
        },
        ApprovalStatus::Pending => ExpertUpdate {
            approval_status: Some(decision.as_str().to_string()),
            updated_at: Some(now),
            ..Default::default()
        },
    }
}

pub struct ExpertService {
    diesel_pool: DieselPool,
}

impl ExpertService {
    pub fn new(state: &AppState) -> Self {
        Self {
            diesel_pool: state.diesel_pool.clone(),
        }
    }

    pub async fn marketplace(
        &self,
        filter: &ExpertFilter,
        page: &PaginationQuery,
    ) -> ServiceResult<Paginated<ExpertPublic>> {
        let mut conn = self.diesel_pool.get().await?;
        let (experts, total) = Expert::list(&mut conn, filter, page, true).await?;
        Ok(Paginated::new(
            experts.into_iter().map(ExpertPublic::from).collect(),
            page,
            total,
        ))
    }

    /// Unapproved or inactive experts are invisible in the marketplace
    pub async fn marketplace_get(&self, expert_id: Uuid) -> ServiceResult<ExpertPublic> {
        let mut conn = self.diesel_pool.get().await?;
        let expert = Expert::find_by_id(&mut conn, expert_id)
            .await
            .or_not_found("Expert")?;
        if !expert.is_available() {
            return Err(ServiceError::NotFound("Expert"));
        }
        Ok(expert.into())
    }

    pub async fn profile(&self, user: &AuthenticatedUser) -> ServiceResult<Expert> {
        let mut conn = self.diesel_pool.get().await?;
        Ok(Expert::find_by_id(&mut conn, user.user_id)
            .await
            .or_not_found("Expert")?)
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn update_profile(
        &self,
        user: &AuthenticatedUser,
        request: UpdateExpertRequest,
    ) -> ServiceResult<Expert> {
        self.apply_update(user, user.user_id, request, false).await
    }

    pub async fn assigned_dossiers(
        &self,
        user: &AuthenticatedUser,
        filter: &DossierFilter,
        page: &PaginationQuery,
    ) -> ServiceResult<Paginated<DossierView>> {
        let mut conn = self.diesel_pool.get().await?;
        let (items, total) = ClientProduitEligible::list_scoped(
            &mut conn,
            DossierScope::Expert(user.user_id),
            filter,
            page,
        )
        .await?;
        Ok(Paginated::new(items, page, total))
    }

    pub async fn list(
        &self,
        filter: &ExpertFilter,
        page: &PaginationQuery,
    ) -> ServiceResult<Paginated<Expert>> {
        let mut conn = self.diesel_pool.get().await?;
        let (items, total) = Expert::list(&mut conn, filter, page, false).await?;
        Ok(Paginated::new(items, page, total))
    }

    pub async fn get(&self, expert_id: Uuid) -> ServiceResult<Expert> {
        let mut conn = self.diesel_pool.get().await?;
        Ok(Expert::find_by_id(&mut conn, expert_id)
            .await
            .or_not_found("Expert")?)
    }

    #[instrument(skip(self, admin, request), fields(email = %request.email))]
    pub async fn create(
        &self,
        admin: &AuthenticatedUser,
        request: CreateExpertRequest,
    ) -> ServiceResult<Expert> {
        let mut request = request;
        request.siren = request.siren.as_deref().map(normalize_siren);
        request.validate()?;

        let email = request.email.trim().to_lowercase();
        let mut conn = self.diesel_pool.get().await?;
        if Expert::find_by_email(&mut conn, &email)
            .await
            .optional()?
            .is_some()
        {
            return Err(ServiceError::Conflict(
                "An expert already exists for this email".to_string(),
            ));
        }

        let (approval, status) = if request.auto_approve {
            (ApprovalStatus::Approved, ExpertStatus::Active)
        } else {
            (ApprovalStatus::Pending, ExpertStatus::Inactive)
        };
        let now = Utc::now();
        let new_expert = NewExpert {
            email,
            password_hash: hash_password(&request.password)?,
            name: request.name.trim().to_string(),
            company_name: trim_optional_field(request.company_name.as_ref()),
            phone_number: trim_optional_field(request.phone_number.as_ref()),
            siren: request.siren,
            specializations: request.specializations,
            experience: trim_optional_field(request.experience.as_ref()),
            location: trim_optional_field(request.location.as_ref()),
            description: request.description,
            compensation: request.compensation,
            status: status.as_str().to_string(),
            approval_status: approval.as_str().to_string(),
            approved_at: request.auto_approve.then_some(now),
            approved_by: request.auto_approve.then_some(admin.user_id),
        };
        let expert = Expert::create(&mut conn, new_expert).await?;

        AuditLogger::log_action(
            AuditAction::AccountCreated,
            admin.actor(),
            "expert",
            Some(expert.id),
            Some(json!({ "approval_status": expert.approval_status })),
        )
        .await;
        info!(expert_id = %expert.id, approval = %expert.approval_status, "Expert created");
        Ok(expert)
    }

    #[instrument(skip(self, admin, request))]
    pub async fn update(
        &self,
        admin: &AuthenticatedUser,
        expert_id: Uuid,
        request: UpdateExpertRequest,
    ) -> ServiceResult<Expert> {
        self.apply_update(admin, expert_id, request, true).await
    }

    async fn apply_update(
        &self,
        actor: &AuthenticatedUser,
        expert_id: Uuid,
        request: UpdateExpertRequest,
        privileged: bool,
    ) -> ServiceResult<Expert> {
        let mut request = request;
        request.siren = request.siren.as_deref().map(normalize_siren);
        request.validate()?;

        let mut conn = self.diesel_pool.get().await?;
        Expert::find_by_id(&mut conn, expert_id)
            .await
            .or_not_found("Expert")?;
        let expert =
            Expert::update(&mut conn, expert_id, request.into_changeset(privileged)).await?;

        AuditLogger::log_action(
            AuditAction::AccountUpdated,
            actor.actor(),
            "expert",
            Some(expert.id),
            None,
        )
        .await;
        Ok(expert)
    }

    async fn decide(
        conn: &mut AsyncPgConnection,
        expert_id: Uuid,
        update: ExpertUpdate,
        notification: impl FnOnce(&Expert) -> NewNotification + Send,
    ) -> ServiceResult<Expert> {
        conn.transaction::<_, ServiceError, _>(|conn| {
            async move {
                let expert = Expert::update(conn, expert_id, update).await?;
                NotificationService::notify(conn, notification(&expert)).await?;
                Ok(expert)
            }
            .scope_boxed()
        })
        .await
    }

    #[instrument(skip(self, admin))]
    pub async fn approve(
        &self,
        admin: &AuthenticatedUser,
        expert_id: Uuid,
    ) -> ServiceResult<Expert> {
        let mut conn = self.diesel_pool.get().await?;
        let current = Expert::find_by_id(&mut conn, expert_id)
            .await
            .or_not_found("Expert")?;
        if current.approval_enum() == ApprovalStatus::Approved {
            return Err(ServiceError::Conflict("Expert is already approved".to_string()));
        }

        let expert = Self::decide(
            &mut conn,
            expert_id,
            approval_update(ApprovalStatus::Approved, admin.user_id, None),
            |expert| {
                NewNotification::new(
                    expert.id,
                    UserType::Expert,
                    kinds::EXPERT_APPROVED,
                    "Compte approuvé",
                    "Votre compte expert a été approuvé. Vous pouvez maintenant vous connecter.",
                )
                .priority(NotificationPriority::High)
                .action_url("/expert/dashboard")
            },
        )
        .await?;

        AuditLogger::log_action(
            AuditAction::ExpertApproved,
            admin.actor(),
            "expert",
            Some(expert.id),
            Some(json!({ "previous": current.approval_status })),
        )
        .await;
        info!(expert_id = %expert.id, "Expert approved");
        Ok(expert)
    }

    #[instrument(skip(self, admin, request))]
    pub async fn reject(
        &self,
        admin: &AuthenticatedUser,
        expert_id: Uuid,
        request: RejectExpertRequest,
    ) -> ServiceResult<Expert> {
        request.validate()?;
        let reason = request.reason.trim().to_string();
        if reason.is_empty() {
            return Err(ServiceError::ValidationError(
                "A rejection reason is required".to_string(),
            ));
        }

        let mut conn = self.diesel_pool.get().await?;
        Expert::find_by_id(&mut conn, expert_id)
            .await
            .or_not_found("Expert")?;

        let message = format!("Votre candidature n'a pas été retenue : {reason}");
        let expert = Self::decide(
            &mut conn,
            expert_id,
            approval_update(ApprovalStatus::Rejected, admin.user_id, Some(reason.clone())),
            |expert| {
                NewNotification::new(
                    expert.id,
                    UserType::Expert,
                    kinds::EXPERT_REJECTED,
                    "Candidature refusée",
                    message,
                )
                .priority(NotificationPriority::High)
            },
        )
        .await?;

        AuditLogger::log_action(
            AuditAction::ExpertRejected,
            admin.actor(),
            "expert",
            Some(expert.id),
            Some(json!({ "reason": reason })),
        )
        .await;
        Ok(expert)
    }

    pub async fn suspend(
        &self,
        admin: &AuthenticatedUser,
        expert_id: Uuid,
    ) -> ServiceResult<Expert> {
        self.set_status(admin, expert_id, ExpertStatus::Suspended).await
    }

    pub async fn reactivate(
        &self,
        admin: &AuthenticatedUser,
        expert_id: Uuid,
    ) -> ServiceResult<Expert> {
        self.set_status(admin, expert_id, ExpertStatus::Active).await
    }

    #[instrument(skip(self, admin))]
    async fn set_status(
        &self,
        admin: &AuthenticatedUser,
        expert_id: Uuid,
        status: ExpertStatus,
    ) -> ServiceResult<Expert> {
        let mut conn = self.diesel_pool.get().await?;
        let current = Expert::find_by_id(&mut conn, expert_id)
            .await
            .or_not_found("Expert")?;
        let expert = Expert::update(
            &mut conn,
            expert_id,
            ExpertUpdate {
                status: Some(status.as_str().to_string()),
                updated_at: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await?;

        AuditLogger::log_action(
            AuditAction::AccountStatusChanged,
            admin.actor(),
            "expert",
            Some(expert.id),
            Some(json!({ "from": current.status, "to": expert.status })),
        )
        .await;
        Ok(expert)
    }

    #[instrument(skip(self, admin))]
    pub async fn delete(&self, admin: &AuthenticatedUser, expert_id: Uuid) -> ServiceResult<()> {
        let mut conn = self.diesel_pool.get().await?;
        Expert::find_by_id(&mut conn, expert_id)
            .await
            .or_not_found("Expert")?;
        let now = Utc::now();
        Expert::update(
            &mut conn,
            expert_id,
            ExpertUpdate {
                status: Some(ExpertStatus::Inactive.as_str().to_string()),
                deleted_at: Some(Some(now)),
                updated_at: Some(now),
                ..Default::default()
            },
        )
        .await?;

        AuditLogger::log_action(
            AuditAction::AccountDeleted,
            admin.actor(),
            "expert",
            Some(expert_id),
            None,
        )
        .await;
        info!(expert_id = %expert_id, "Expert soft-deleted");
        Ok(())
    }

    pub async fn stats(&self) -> ServiceResult<StatusCounts> {
        let mut conn = self.diesel_pool.get().await?;
        Ok(StatusCounts::from_counts(
            Expert::count_by_approval(&mut conn).await?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_activates_and_clears_reason() {
        let admin = Uuid::new_v4();
        let update = approval_update(ApprovalStatus::Approved, admin, None);
        assert_eq!(update.approval_status.as_deref(), Some("approved"));
        assert_eq!(update.status.as_deref(), Some("active"));
        assert_eq!(update.approved_by, Some(Some(admin)));
        assert_eq!(update.rejection_reason, Some(None));
    }

    #[test]
    fn test_rejection_records_reason() {
        let update = approval_update(
            ApprovalStatus::Rejected,
            Uuid::new_v4(),
            Some("Dossier incomplet".into()),
        );
        assert_eq!(update.approval_status.as_deref(), Some("rejected"));
        assert_eq!(update.status.as_deref(), Some("inactive"));
        assert_eq!(update.rejection_reason, Some(Some("Dossier incomplet".into())));
        assert_eq!(update.approved_at, Some(None));
    }
}
