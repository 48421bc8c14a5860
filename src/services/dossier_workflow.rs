// Dossier workflow: generated steps, the event timeline and internal comments

use chrono::Utc;
use diesel::QueryResult;
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
        dossier::{ClientProduitEligible, DossierUpdate},
        dossier_workflow::{
            dossier_progress, steps_for_dossier, CommentAudience, CommentChangeset, CommentFilter,
            CreateCommentRequest, CreateTimelineEventRequest, DossierComment, DossierStep,
            DossierTimelineEvent, NewDossierComment, NewTimelineEvent, StepChangeset,
            TimelinePage, TimelineQuery, UpdateCommentRequest, UpdateStepRequest,
        },
        status::{CommentType, TimelineEventType},
    },
    services::dossier::{ensure_can_work_on, ensure_dossier_access},
    utils::service_error::{OrNotFound, ServiceError, ServiceResult},
};

/// Steps and a `dossier_created` event for freshly inserted dossiers.
/// Runs on the caller's connection so it joins the caller's transaction.
pub async fn open_workflows(
    conn: &mut AsyncPgConnection,
    dossiers: &[ClientProduitEligible],
    opened_by: Option<&AuthenticatedUser>,
) -> QueryResult<()> {
    let today = Utc::now().date_naive();
    let steps: Vec<_> = dossiers
        .iter()
        .flat_map(|d| steps_for_dossier(d.id, today))
        .collect();
    DossierStep::create_many(conn, &steps).await?;

    let events: Vec<_> = dossiers
        .iter()
        .map(|d| {
            let event = match opened_by {
                Some(user) => {
                    NewTimelineEvent::by(user, d.id, TimelineEventType::DossierCreated, "Dossier ouvert")
                },
                None => NewTimelineEvent::system(d.id, TimelineEventType::DossierCreated, "Dossier ouvert"),
            };
            event
                .description(format!("Statut initial : {}", d.statut))
                .metadata(json!({
                    "statut": d.statut,
                    "produit_id": d.produit_id,
                    "simulation_id": d.simulation_id,
                }))
        })
        .collect();
    DossierTimelineEvent::create_many(conn, &events).await?;
    Ok(())
}

/// Who may read which comments; clients never see the internal thread
pub fn comment_audience(user: &AuthenticatedUser) -> ServiceResult<CommentAudience> {
    match user.user_type {
        UserType::Admin => Ok(CommentAudience::Everything),
        UserType::Expert => Ok(CommentAudience::Expert),
        UserType::Apporteur => Ok(CommentAudience::Apporteur),
        UserType::Client => Err(ServiceError::Forbidden(
            "Dossier comments are internal".to_string(),
        )),
    }
}

/// Only manual comments can change, and only by their author or an admin
pub fn ensure_can_edit_comment(
    user: &AuthenticatedUser,
    comment: &DossierComment,
) -> ServiceResult<()> {
    if comment.comment_type_enum() != CommentType::Manual {
        return Err(ServiceError::Forbidden(
            "System comments cannot be changed".to_string(),
        ));
    }
    if user.is_admin() || comment.created_by == Some(user.user_id) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "Only the author or an administrator can change this comment".to_string(),
        ))
    }
}

pub struct DossierWorkflowService {
    diesel_pool: DieselPool,
}

impl DossierWorkflowService {
    pub fn new(state: &AppState) -> Self {
        Self {
            diesel_pool: state.diesel_pool.clone(),
        }
    }

    async fn load_dossier(
        conn: &mut AsyncPgConnection,
        user: &AuthenticatedUser,
        dossier_id: Uuid,
    ) -> ServiceResult<ClientProduitEligible> {
        let dossier = ClientProduitEligible::find_by_id(conn, dossier_id)
            .await
            .or_not_found("Dossier")?;
        ensure_dossier_access(conn, user, &dossier).await?;
        Ok(dossier)
    }

    pub async fn steps(
        &self,
        user: &AuthenticatedUser,
        dossier_id: Uuid,
    ) -> ServiceResult<Vec<DossierStep>> {
        let mut conn = self.diesel_pool.get().await?;
        Self::load_dossier(&mut conn, user, dossier_id).await?;
        Ok(DossierStep::list_for_dossier(&mut conn, dossier_id).await?)
    }

    /// Assigned expert or admin. The dossier's `current_step` and `progress`
    /// are recomputed from its steps in the same transaction.
    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn update_step(
        &self,
        user: &AuthenticatedUser,
        dossier_id: Uuid,
        step_id: Uuid,
        request: UpdateStepRequest,
    ) -> ServiceResult<DossierStep> {
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

        let changeset = StepChangeset::from_request(&request, Utc::now());
        let step = conn
            .transaction::<_, ServiceError, _>(|conn| {
                async move {
                    let step = DossierStep::update_in_dossier(conn, dossier_id, step_id, changeset)
                        .await
                        .or_not_found("Step")?;

                    let steps = DossierStep::list_for_dossier(conn, dossier_id).await?;
                    let (current_step, progress) = dossier_progress(&steps);
                    ClientProduitEligible::update(
                        conn,
                        dossier_id,
                        DossierUpdate::progress(current_step, progress, None),
                    )
                    .await?;

                    DossierTimelineEvent::create(
                        conn,
                        NewTimelineEvent::by(
                            user,
                            dossier_id,
                            TimelineEventType::StepUpdated,
                            format!("Étape « {} » mise à jour", step.step_name),
                        )
                        .metadata(json!({
                            "step_id": step.id,
                            "status": step.status,
                            "progress": step.progress,
                        })),
                    )
                    .await?;
                    Ok(step)
                }
                .scope_boxed()
            })
            .await?;

        info!(dossier_id = %dossier_id, step_id = %step_id, status = %step.status, "Dossier step updated");
        Ok(step)
    }

    pub async fn timeline(
        &self,
        user: &AuthenticatedUser,
        dossier_id: Uuid,
        query: &TimelineQuery,
    ) -> ServiceResult<TimelinePage> {
        let mut conn = self.diesel_pool.get().await?;
        Self::load_dossier(&mut conn, user, dossier_id).await?;
        let (events, total) = DossierTimelineEvent::list(&mut conn, dossier_id, query).await?;
        Ok(TimelinePage {
            events,
            total,
            limit: query.limit(),
            offset: query.offset(),
        })
    }

    /// Assigned expert or admin
    pub async fn add_timeline_event(
        &self,
        user: &AuthenticatedUser,
        dossier_id: Uuid,
        request: CreateTimelineEventRequest,
    ) -> ServiceResult<DossierTimelineEvent> {
        request.validate()?;
        let mut conn = self.diesel_pool.get().await?;
        let dossier = ClientProduitEligible::find_by_id(&mut conn, dossier_id)
            .await
            .or_not_found("Dossier")?;
        ensure_can_work_on(user, &dossier)?;

        let mut event = NewTimelineEvent::by(
            user,
            dossier_id,
            request.event_type.unwrap_or(TimelineEventType::Manual),
            request.title.trim(),
        );
        if let Some(description) = request.description {
            event = event.description(description);
        }
        if let Some(metadata) = request.metadata {
            event = event.metadata(metadata);
        }
        Ok(DossierTimelineEvent::create(&mut conn, event).await?)
    }

    /// Admin only
    pub async fn delete_timeline_event(
        &self,
        user: &AuthenticatedUser,
        dossier_id: Uuid,
        event_id: Uuid,
    ) -> ServiceResult<()> {
        user.require(&[UserType::Admin])?;
        let mut conn = self.diesel_pool.get().await?;
        if DossierTimelineEvent::delete_in_dossier(&mut conn, dossier_id, event_id).await? == 0 {
            return Err(ServiceError::NotFound("Timeline event"));
        }
        info!(dossier_id = %dossier_id, event_id = %event_id, "Timeline event deleted");
        Ok(())
    }

    pub async fn comments(
        &self,
        user: &AuthenticatedUser,
        dossier_id: Uuid,
        filter: &CommentFilter,
    ) -> ServiceResult<Vec<DossierComment>> {
        let audience = comment_audience(user)?;
        let mut conn = self.diesel_pool.get().await?;
        Self::load_dossier(&mut conn, user, dossier_id).await?;
        Ok(DossierComment::list_for(&mut conn, dossier_id, audience, filter.category).await?)
    }

    /// Admin, assigned expert or the client's apporteur; mirrored on the timeline
    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn add_comment(
        &self,
        user: &AuthenticatedUser,
        dossier_id: Uuid,
        request: CreateCommentRequest,
    ) -> ServiceResult<DossierComment> {
        request.validate()?;
        comment_audience(user)?;
        if request.content.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Comment cannot be blank".to_string(),
            ));
        }
        let mut conn = self.diesel_pool.get().await?;
        Self::load_dossier(&mut conn, user, dossier_id).await?;

        let new_comment = NewDossierComment::manual(user, dossier_id, request);
        let comment = conn
            .transaction::<_, ServiceError, _>(|conn| {
                async move {
                    let comment = DossierComment::create(conn, new_comment).await?;
                    DossierTimelineEvent::create(
                        conn,
                        NewTimelineEvent::by(
                            user,
                            dossier_id,
                            TimelineEventType::Comment,
                            "Nouveau commentaire",
                        )
                        .metadata(json!({
                            "comment_id": comment.id,
                            "category": comment.category,
                        })),
                    )
                    .await?;
                    Ok(comment)
                }
                .scope_boxed()
            })
            .await?;
        Ok(comment)
    }

    pub async fn update_comment(
        &self,
        user: &AuthenticatedUser,
        dossier_id: Uuid,
        comment_id: Uuid,
        request: UpdateCommentRequest,
    ) -> ServiceResult<DossierComment> {
        request.validate()?;
        let mut conn = self.diesel_pool.get().await?;
        let comment = DossierComment::find_in_dossier(&mut conn, dossier_id, comment_id)
            .await
            .or_not_found("Comment")?;
        ensure_can_edit_comment(user, &comment)?;
        Ok(DossierComment::update(&mut conn, comment_id, CommentChangeset::from(request)).await?)
    }

    /// Soft delete; the row stays for the audit trail
    pub async fn delete_comment(
        &self,
        user: &AuthenticatedUser,
        dossier_id: Uuid,
        comment_id: Uuid,
    ) -> ServiceResult<()> {
        let mut conn = self.diesel_pool.get().await?;
        let comment = DossierComment::find_in_dossier(&mut conn, dossier_id, comment_id)
            .await
            .or_not_found("Comment")?;
        ensure_can_edit_comment(user, &comment)?;
        DossierComment::soft_delete(&mut conn, comment_id).await?;
        Ok(())
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

    fn comment(created_by: Option<Uuid>, comment_type: CommentType) -> DossierComment {
        DossierComment {
            id: Uuid::new_v4(),
            dossier_id: Uuid::new_v4(),
            comment_type: comment_type.as_str().into(),
            category: "general".into(),
            content: "Pièces reçues".into(),
            created_by,
            created_by_type: "expert".into(),
            visible_to_expert: true,
            visible_to_apporteur: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_clients_cannot_read_comments() {
        assert!(matches!(
            comment_audience(&user(UserType::Client)),
            Err(ServiceError::Forbidden(_))
        ));
        assert_eq!(
            comment_audience(&user(UserType::Apporteur)).unwrap(),
            CommentAudience::Apporteur
        );
        assert_eq!(
            comment_audience(&user(UserType::Admin)).unwrap(),
            CommentAudience::Everything
        );
    }

    #[test]
    fn test_only_author_or_admin_edits_manual_comments() {
        let author = user(UserType::Expert);
        let own = comment(Some(author.user_id), CommentType::Manual);

        assert!(ensure_can_edit_comment(&author, &own).is_ok());
        assert!(ensure_can_edit_comment(&user(UserType::Expert), &own).is_err());
        assert!(ensure_can_edit_comment(&user(UserType::Admin), &own).is_ok());

        let system = comment(None, CommentType::System);
        assert!(ensure_can_edit_comment(&user(UserType::Admin), &system).is_err());
    }
}
