// Rendez-vous: scheduling, expert validation, participant responses and completion

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel_async::{scoped_futures::ScopedFutureExt, AsyncConnection};
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    db::DieselPool,
    middleware::auth::AuthenticatedUser,
    models::{
        auth::UserType,
        client::Client,
        expert::Expert,
        notification::{kinds, NewNotification},
        rdv::{
            is_valid_slot, CalendarEvent, CreateRdvRequest, MarkCompletedRequest, NewRdv,
            NewRdvProduit, Rdv, RdvAction, RdvDetail, RdvFilter, RdvProduit, RdvResponseRequest,
            RdvScope, RdvUpdate, UpdateRdvRequest, DEFAULT_DURATION_MINUTES, DEFAULT_PRIORITY,
            DEFAULT_TIMEZONE,
        },
        status::{NotificationPriority, RdvCategory, RdvStatus},
    },
    services::notification::NotificationService,
    utils::{
        audit_logger::{AuditAction, AuditLogger},
        service_error::{OrNotFound, ServiceError, ServiceResult},
    },
};

/// `GET /api/rdv` returns raw rows or calendar events depending on `format`
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum RdvListing {
    Rdvs(Vec<Rdv>),
    Calendar(Vec<CalendarEvent>),
}

fn slot_error() -> ServiceError {
    ServiceError::ValidationError("Time must start at :00 or :30".to_string())
}

fn check_slot(time: NaiveTime) -> ServiceResult<()> {
    if is_valid_slot(time) {
        Ok(())
    } else {
        Err(slot_error())
    }
}

fn required_alternative(request: &RdvResponseRequest) -> ServiceResult<(NaiveDate, NaiveTime)> {
    match (request.alternative_date, request.alternative_time) {
        (Some(date), Some(time)) => {
            check_slot(time)?;
            Ok((date, time))
        },
        _ => Err(ServiceError::ValidationError(
            "alternative_date and alternative_time are required".to_string(),
        )),
    }
}

fn ensure_open(rdv: &Rdv) -> ServiceResult<()> {
    if rdv.status_enum().is_closed() {
        Err(ServiceError::ValidationError(format!(
            "RDV is already {}",
            rdv.status
        )))
    } else {
        Ok(())
    }
}

/// Participants and admins
pub fn ensure_participant(user: &AuthenticatedUser, rdv: &Rdv) -> ServiceResult<()> {
    if user.is_admin() || rdv.is_participant(user.user_type, user.user_id) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "You are not a participant of this RDV".to_string(),
        ))
    }
}

/// Changes applied when the assigned expert validates a proposed RDV.
/// An alternative slot keeps the RDV `proposed` until the other side answers.
pub fn validation_update(
    rdv: &Rdv,
    request: &RdvResponseRequest,
    now: DateTime<Utc>,
) -> ServiceResult<RdvUpdate> {
    ensure_open(rdv)?;
    let mut update = RdvUpdate {
        expert_notes: request.notes.clone().map(Some),
        last_response: Some(Some(request.action.as_str().to_string())),
        last_response_at: Some(Some(now)),
        updated_at: Some(now),
        ..Default::default()
    };
    match request.action {
        RdvAction::Accept => {
            update.status = Some(RdvStatus::Confirmed.as_str().to_string());
        },
        RdvAction::ProposeAlternative => {
            let (date, time) = required_alternative(request)?;
            update.original_date = Some(Some(rdv.scheduled_date));
            update.original_time = Some(Some(rdv.scheduled_time));
            update.alternative_date = Some(Some(date));
            update.alternative_time = Some(Some(time));
            update.status = Some(RdvStatus::Proposed.as_str().to_string());
        },
        RdvAction::Refuse => {
            return Err(ServiceError::ValidationError(
                "Experts validate with accept or propose_alternative".to_string(),
            ))
        },
    }
    Ok(update)
}

/// Changes applied when a participant answers an RDV.
/// Accepting a pending alternative moves the RDV onto that slot.
pub fn response_update(
    rdv: &Rdv,
    responder: Uuid,
    request: &RdvResponseRequest,
    now: DateTime<Utc>,
) -> ServiceResult<RdvUpdate> {
    ensure_open(rdv)?;
    let mut update = RdvUpdate {
        last_response: Some(Some(request.action.as_str().to_string())),
        last_response_by: Some(Some(responder)),
        last_response_at: Some(Some(now)),
        updated_at: Some(now),
        ..Default::default()
    };
    match request.action {
        RdvAction::Accept => {
            update.status = Some(RdvStatus::Confirmed.as_str().to_string());
            if let (Some(date), Some(time)) = (rdv.alternative_date, rdv.alternative_time) {
                update.scheduled_date = Some(date);
                update.scheduled_time = Some(time);
                update.alternative_date = Some(None);
                update.alternative_time = Some(None);
            }
        },
        RdvAction::Refuse => {
            let reason = request
                .reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .ok_or_else(|| {
                    ServiceError::ValidationError("A refusal reason is required".to_string())
                })?;
            update.status = Some(RdvStatus::Cancelled.as_str().to_string());
            update.refusal_reason = Some(Some(reason.to_string()));
        },
        RdvAction::ProposeAlternative => {
            let (date, time) = required_alternative(request)?;
            update.original_date = Some(Some(rdv.scheduled_date));
            update.original_time = Some(Some(rdv.scheduled_time));
            update.alternative_date = Some(Some(date));
            update.alternative_time = Some(Some(time));
            update.status = Some(RdvStatus::Rescheduled.as_str().to_string());
        },
    }
    Ok(update)
}

fn slot_text(date: NaiveDate, time: NaiveTime) -> String {
    format!("{} à {}", date.format("%d/%m/%Y"), time.format("%H:%M"))
}

fn response_message(
    action: RdvAction,
    rdv: &Rdv,
    request: &RdvResponseRequest,
) -> (&'static str, &'static str, String) {
    match action {
        RdvAction::Accept => (
            kinds::RDV_CONFIRMED,
            "RDV confirmé",
            format!("Le rendez-vous \"{}\" est confirmé.", rdv.title),
        ),
        RdvAction::Refuse => (
            kinds::RDV_REFUSED,
            "RDV refusé",
            format!(
                "Le rendez-vous \"{}\" a été refusé : {}",
                rdv.title,
                request.reason.as_deref().unwrap_or_default()
            ),
        ),
        RdvAction::ProposeAlternative => (
            kinds::RDV_ALTERNATIVE_PROPOSED,
            "Date alternative proposée",
            match (request.alternative_date, request.alternative_time) {
                (Some(date), Some(time)) => format!(
                    "Une date alternative a été proposée : {}",
                    slot_text(date, time)
                ),
                _ => "Une date alternative a été proposée".to_string(),
            },
        ),
    }
}

fn notifications_for(
    recipients: Vec<(UserType, Uuid)>,
    rdv: &Rdv,
    kind: &str,
    title: &str,
    message: &str,
) -> Vec<NewNotification> {
    recipients
        .into_iter()
        .map(|(user_type, user_id)| {
            NewNotification::new(user_id, user_type, kind, title, message.to_string())
                .action_url(format!("/agenda?rdv={}", rdv.id))
                .metadata(json!({ "rdv_id": rdv.id }))
        })
        .collect()
}

pub struct RdvService {
    diesel_pool: DieselPool,
}

impl RdvService {
    pub fn new(state: &AppState) -> Self {
        Self {
            diesel_pool: state.diesel_pool.clone(),
        }
    }

    async fn load_for(&self, user: &AuthenticatedUser, rdv_id: Uuid) -> ServiceResult<Rdv> {
        let mut conn = self.diesel_pool.get().await?;
        let rdv = Rdv::find_by_id(&mut conn, rdv_id)
            .await
            .or_not_found("RDV")?;
        ensure_participant(user, &rdv)?;
        Ok(rdv)
    }

    #[instrument(skip(self, user, filter), fields(user_id = %user.user_id))]
    pub async fn list(
        &self,
        user: &AuthenticatedUser,
        filter: &RdvFilter,
    ) -> ServiceResult<RdvListing> {
        let scope = if user.is_admin() {
            RdvScope::All
        } else {
            RdvScope::Participant(user.user_type, user.user_id)
        };
        let mut conn = self.diesel_pool.get().await?;
        let rdvs = Rdv::list_scoped(&mut conn, scope, filter).await?;
        if filter.wants_calendar() {
            Ok(RdvListing::Calendar(
                rdvs.iter().map(Rdv::to_calendar_event).collect(),
            ))
        } else {
            Ok(RdvListing::Rdvs(rdvs))
        }
    }

    pub async fn get(&self, user: &AuthenticatedUser, rdv_id: Uuid) -> ServiceResult<RdvDetail> {
        let rdv = self.load_for(user, rdv_id).await?;
        let mut conn = self.diesel_pool.get().await?;
        let produits = RdvProduit::list_for_rdv(&mut conn, rdv.id).await?;
        Ok(RdvDetail { rdv, produits })
    }

    pub async fn pending_validation(&self, user: &AuthenticatedUser) -> ServiceResult<Vec<Rdv>> {
        user.require(&[UserType::Expert])?;
        let mut conn = self.diesel_pool.get().await?;
        Ok(Rdv::pending_for_expert(&mut conn, user.user_id).await?)
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn create(
        &self,
        user: &AuthenticatedUser,
        request: CreateRdvRequest,
    ) -> ServiceResult<RdvDetail> {
        request.validate()?;
        check_slot(request.scheduled_time)?;

        let mut client_id = request.client_id;
        let mut expert_id = request.expert_id;
        let mut apporteur_id = request.apporteur_id;
        match user.user_type {
            UserType::Client => client_id = Some(user.user_id),
            UserType::Expert => expert_id = Some(user.user_id),
            UserType::Apporteur => apporteur_id = Some(user.user_id),
            UserType::Admin => {},
        }
        let others = [client_id, expert_id, apporteur_id]
            .into_iter()
            .flatten()
            .filter(|id| *id != user.user_id)
            .count();
        if others == 0 {
            return Err(ServiceError::ValidationError(
                "An RDV needs at least one other participant".to_string(),
            ));
        }

        let mut conn = self.diesel_pool.get().await?;
        if let Some(id) = client_id {
            Client::find_by_id(&mut conn, id).await.or_not_found("Client")?;
        }
        if let Some(id) = expert_id {
            Expert::find_by_id(&mut conn, id).await.or_not_found("Expert")?;
        }

        let status = request.status.unwrap_or(RdvStatus::Proposed);
        let new_rdv = NewRdv {
            client_id,
            expert_id,
            apporteur_id,
            created_by: user.user_id,
            created_by_type: user.user_type.as_str().to_string(),
            title: request
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("RDV {}", request.meeting_type.label())),
            description: request.description,
            scheduled_date: request.scheduled_date,
            scheduled_time: request.scheduled_time,
            duration_minutes: request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
            meeting_type: request.meeting_type.as_str().to_string(),
            location: request.location,
            meeting_url: request.meeting_url,
            status: status.as_str().to_string(),
            category: request
                .category
                .unwrap_or(RdvCategory::ClientRdv)
                .as_str()
                .to_string(),
            priority: request.priority.unwrap_or(DEFAULT_PRIORITY),
            timezone: request
                .timezone
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
            metadata: request.metadata.unwrap_or_else(|| json!({})),
        };
        let produits = request.produits;
        let creator = user.user_id;

        let detail = conn
            .transaction::<_, ServiceError, _>(|conn| {
                async move {
                    let rdv = Rdv::create(conn, new_rdv).await?;
                    let links: Vec<NewRdvProduit> = produits
                        .into_iter()
                        .enumerate()
                        .map(|(index, p)| NewRdvProduit {
                            rdv_id: rdv.id,
                            produit_id: p.produit_id,
                            client_produit_eligible_id: p.client_produit_eligible_id,
                            priority: p.priority.unwrap_or(index as i32 + 1),
                            notes: p.notes,
                        })
                        .collect();
                    RdvProduit::create_many(conn, &links).await?;

                    if status == RdvStatus::Proposed {
                        if let Some(expert) = rdv.expert_id.filter(|id| *id != creator) {
                            NotificationService::notify(
                                conn,
                                NewNotification::new(
                                    expert,
                                    UserType::Expert,
                                    kinds::RDV_PROPOSED,
                                    "Nouveau RDV à valider",
                                    format!(
                                        "Un rendez-vous vous est proposé le {}.",
                                        slot_text(rdv.scheduled_date, rdv.scheduled_time)
                                    ),
                                )
                                .priority(NotificationPriority::High)
                                .action_url(format!("/agenda?rdv={}", rdv.id))
                                .metadata(json!({ "rdv_id": rdv.id })),
                            )
                            .await?;
                        }
                    }

                    let produits = RdvProduit::list_for_rdv(conn, rdv.id).await?;
                    Ok(RdvDetail { rdv, produits })
                }
                .scope_boxed()
            })
            .await?;

        info!(rdv_id = %detail.rdv.id, status = %detail.rdv.status, "RDV created");
        Ok(detail)
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn update(
        &self,
        user: &AuthenticatedUser,
        rdv_id: Uuid,
        request: UpdateRdvRequest,
    ) -> ServiceResult<Rdv> {
        request.validate()?;
        if let Some(time) = request.scheduled_time {
            check_slot(time)?;
        }
        let rdv = self.load_for(user, rdv_id).await?;
        ensure_open(&rdv)?;

        let mut conn = self.diesel_pool.get().await?;
        Ok(Rdv::update(&mut conn, rdv.id, request.into_changeset()).await?)
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn validate(
        &self,
        user: &AuthenticatedUser,
        rdv_id: Uuid,
        request: RdvResponseRequest,
    ) -> ServiceResult<Rdv> {
        user.require(&[UserType::Expert])?;
        request.validate()?;
        let rdv = self.load_for(user, rdv_id).await?;
        let update = validation_update(&rdv, &request, Utc::now())?;

        // The apporteur who booked the RDV hears back first, otherwise the client
        let recipient = rdv
            .apporteur_id
            .map(|id| (UserType::Apporteur, id))
            .or(rdv.client_id.map(|id| (UserType::Client, id)));
        let (kind, title, message) = response_message(request.action, &rdv, &request);
        let notifications =
            notifications_for(recipient.into_iter().collect(), &rdv, kind, title, &message);

        let mut conn = self.diesel_pool.get().await?;
        let updated = conn
            .transaction::<_, ServiceError, _>(|conn| {
                async move {
                    let updated = Rdv::update(conn, rdv_id, update).await?;
                    NotificationService::notify_many(conn, notifications).await?;
                    Ok(updated)
                }
                .scope_boxed()
            })
            .await?;

        info!(rdv_id = %rdv_id, action = request.action.as_str(), "RDV validated by expert");
        Ok(updated)
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn respond(
        &self,
        user: &AuthenticatedUser,
        rdv_id: Uuid,
        request: RdvResponseRequest,
    ) -> ServiceResult<Rdv> {
        request.validate()?;
        let rdv = self.load_for(user, rdv_id).await?;
        let update = response_update(&rdv, user.user_id, &request, Utc::now())?;

        let (kind, title, message) = response_message(request.action, &rdv, &request);
        let notifications = notifications_for(
            rdv.other_participants(user.user_id),
            &rdv,
            kind,
            title,
            &message,
        );

        let mut conn = self.diesel_pool.get().await?;
        let updated = conn
            .transaction::<_, ServiceError, _>(|conn| {
                async move {
                    let updated = Rdv::update(conn, rdv_id, update).await?;
                    NotificationService::notify_many(conn, notifications).await?;
                    Ok(updated)
                }
                .scope_boxed()
            })
            .await?;

        info!(
            rdv_id = %rdv_id,
            action = request.action.as_str(),
            status = %updated.status,
            "RDV response recorded"
        );
        Ok(updated)
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn mark_completed(
        &self,
        user: &AuthenticatedUser,
        rdv_id: Uuid,
        request: MarkCompletedRequest,
    ) -> ServiceResult<Rdv> {
        request.validate()?;
        let rdv = self.load_for(user, rdv_id).await?;
        ensure_open(&rdv)?;

        let now = Utc::now();
        let (status, kind, title, message) = if request.completed {
            (
                RdvStatus::Completed,
                kinds::RDV_COMPLETED,
                "RDV effectué",
                format!("Le rendez-vous \"{}\" a été marqué comme effectué.", rdv.title),
            )
        } else {
            (
                RdvStatus::Cancelled,
                kinds::RDV_CANCELLED,
                "RDV non effectué",
                format!(
                    "Le rendez-vous \"{}\" a été marqué comme non effectué.",
                    rdv.title
                ),
            )
        };
        let update = RdvUpdate {
            status: Some(status.as_str().to_string()),
            cancellation_reason: if request.completed {
                None
            } else {
                request.cancellation_reason.clone().map(Some)
            },
            updated_at: Some(now),
            ..Default::default()
        };
        let notifications = notifications_for(
            rdv.other_participants(user.user_id),
            &rdv,
            kind,
            title,
            &message,
        );

        let mut conn = self.diesel_pool.get().await?;
        let updated = conn
            .transaction::<_, ServiceError, _>(|conn| {
                async move {
                    let updated = Rdv::update(conn, rdv_id, update).await?;
                    NotificationService::notify_many(conn, notifications).await?;
                    Ok(updated)
                }
                .scope_boxed()
            })
            .await?;

        info!(rdv_id = %rdv_id, status = %updated.status, "RDV closed");
        Ok(updated)
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn delete(&self, user: &AuthenticatedUser, rdv_id: Uuid) -> ServiceResult<()> {
        let mut conn = self.diesel_pool.get().await?;
        let rdv = Rdv::find_by_id(&mut conn, rdv_id)
            .await
            .or_not_found("RDV")?;
        if !user.is_admin() && rdv.created_by != user.user_id {
            return Err(ServiceError::Forbidden(
                "Only the creator or an administrator can delete this RDV".to_string(),
            ));
        }

        Rdv::delete(&mut conn, rdv.id).await?;
        AuditLogger::log_action(
            AuditAction::RdvDeleted,
            user.actor(),
            "rdv",
            Some(rdv.id),
            Some(json!({ "title": rdv.title, "scheduled_date": rdv.scheduled_date })),
        )
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn rdv(status: RdvStatus) -> Rdv {
        let client = Uuid::new_v4();
        Rdv {
            id: Uuid::new_v4(),
            client_id: Some(client),
            expert_id: Some(Uuid::new_v4()),
            apporteur_id: None,
            created_by: client,
            created_by_type: "client".into(),
            title: "RDV Visio".into(),
            description: None,
            scheduled_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            scheduled_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            duration_minutes: 30,
            meeting_type: "video".into(),
            location: None,
            meeting_url: None,
            status: status.as_str().into(),
            category: "client_rdv".into(),
            priority: 2,
            timezone: DEFAULT_TIMEZONE.into(),
            original_date: None,
            original_time: None,
            alternative_date: None,
            alternative_time: None,
            expert_notes: None,
            refusal_reason: None,
            cancellation_reason: None,
            last_response: None,
            last_response_by: None,
            last_response_at: None,
            metadata: json!({}),
            created_at: Utc::now() - Duration::days(1),
            updated_at: Utc::now() - Duration::days(1),
        }
    }

    fn response(action: RdvAction) -> RdvResponseRequest {
        RdvResponseRequest {
            action,
            alternative_date: None,
            alternative_time: None,
            reason: None,
            notes: None,
        }
    }

    #[test]
    fn test_expert_accept_confirms() {
        let update = validation_update(
            &rdv(RdvStatus::Proposed),
            &response(RdvAction::Accept),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(update.status.as_deref(), Some("confirmed"));
    }

    #[test]
    fn test_expert_alternative_keeps_original_and_stays_proposed() {
        let current = rdv(RdvStatus::Proposed);
        let mut req = response(RdvAction::ProposeAlternative);
        assert!(validation_update(&current, &req, Utc::now()).is_err());

        req.alternative_date = NaiveDate::from_ymd_opt(2025, 6, 3);
        req.alternative_time = NaiveTime::from_hms_opt(14, 30, 0);
        let update = validation_update(&current, &req, Utc::now()).unwrap();
        assert_eq!(update.status.as_deref(), Some("proposed"));
        assert_eq!(update.original_date, Some(Some(current.scheduled_date)));
        assert_eq!(update.original_time, Some(Some(current.scheduled_time)));
        assert_eq!(update.alternative_date, Some(req.alternative_date));
    }

    #[test]
    fn test_refuse_requires_reason() {
        let current = rdv(RdvStatus::Proposed);
        let mut req = response(RdvAction::Refuse);
        assert!(matches!(
            response_update(&current, Uuid::new_v4(), &req, Utc::now()),
            Err(ServiceError::ValidationError(_))
        ));

        req.reason = Some("Indisponible".into());
        let update = response_update(&current, Uuid::new_v4(), &req, Utc::now()).unwrap();
        assert_eq!(update.status.as_deref(), Some("cancelled"));
        assert_eq!(update.refusal_reason, Some(Some("Indisponible".into())));
    }

    #[test]
    fn test_alternative_slot_must_be_on_half_hour() {
        let mut req = response(RdvAction::ProposeAlternative);
        req.alternative_date = NaiveDate::from_ymd_opt(2025, 6, 3);
        req.alternative_time = NaiveTime::from_hms_opt(14, 15, 0);
        assert!(response_update(&rdv(RdvStatus::Confirmed), Uuid::new_v4(), &req, Utc::now()).is_err());

        req.alternative_time = NaiveTime::from_hms_opt(14, 30, 0);
        let update =
            response_update(&rdv(RdvStatus::Confirmed), Uuid::new_v4(), &req, Utc::now()).unwrap();
        assert_eq!(update.status.as_deref(), Some("rescheduled"));
    }

    #[test]
    fn test_accepting_alternative_moves_the_slot() {
        let mut current = rdv(RdvStatus::Rescheduled);
        current.alternative_date = NaiveDate::from_ymd_opt(2025, 6, 4);
        current.alternative_time = NaiveTime::from_hms_opt(9, 30, 0);
        let update =
            response_update(&current, Uuid::new_v4(), &response(RdvAction::Accept), Utc::now())
                .unwrap();
        assert_eq!(update.scheduled_date, current.alternative_date);
        assert_eq!(update.scheduled_time, current.alternative_time);
        assert_eq!(update.alternative_date, Some(None));
    }

    #[test]
    fn test_closed_rdv_rejects_responses() {
        for status in [RdvStatus::Completed, RdvStatus::Cancelled] {
            assert!(response_update(
                &rdv(status),
                Uuid::new_v4(),
                &response(RdvAction::Accept),
                Utc::now()
            )
            .is_err());
        }
    }

    #[test]
    fn test_only_open_rdvs_can_be_closed() {
        assert!(ensure_open(&rdv(RdvStatus::Confirmed)).is_ok());
        assert!(ensure_open(&rdv(RdvStatus::Proposed)).is_ok());
        assert!(matches!(
            ensure_open(&rdv(RdvStatus::Completed)),
            Err(ServiceError::ValidationError(_))
        ));
        assert!(ensure_open(&rdv(RdvStatus::Cancelled)).is_err());
    }
}
