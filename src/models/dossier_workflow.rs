// Dossier workflow rows: generated steps, the event timeline and internal comments

use chrono::{DateTime, Duration, NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::middleware::auth::AuthenticatedUser;
use crate::models::dossier::MAX_STEP;
use crate::models::status::{
    parse_or, CommentCategory, CommentType, StepStatus, StepType, TimelineEventType,
};
use crate::schema::{dossier_comments, dossier_steps, dossier_timeline};

// Steps

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, ToSchema)]
#[diesel(table_name = dossier_steps)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DossierStep {
    pub id: Uuid,
    pub dossier_id: Uuid,
    pub step_order: i32,
    pub step_name: String,
    pub step_type: String,
    pub status: String,
    pub progress: i32,
    pub due_date: Option<NaiveDate>,
    pub estimated_duration_minutes: i32,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = dossier_steps)]
pub struct NewDossierStep {
    pub dossier_id: Uuid,
    pub step_order: i32,
    pub step_name: String,
    pub step_type: String,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub estimated_duration_minutes: i32,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = dossier_steps)]
pub struct StepChangeset {
    pub status: Option<String>,
    pub progress: Option<i32>,
    pub due_date: Option<Option<NaiveDate>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub updated_at: Option<DateTime<Utc>>,
}

struct StepTemplate {
    name: &'static str,
    step_type: StepType,
    due_in_days: i64,
    duration_minutes: i32,
}

/// One entry per step counted by `current_step`
const STEP_TEMPLATES: [StepTemplate; MAX_STEP as usize] = [
    StepTemplate {
        name: "Confirmer l'éligibilité",
        step_type: StepType::Validation,
        due_in_days: 2,
        duration_minutes: 30,
    },
    StepTemplate {
        name: "Sélection de l'expert",
        step_type: StepType::Expertise,
        due_in_days: 7,
        duration_minutes: 60,
    },
    StepTemplate {
        name: "Collecte des documents",
        step_type: StepType::Documentation,
        due_in_days: 14,
        duration_minutes: 120,
    },
    StepTemplate {
        name: "Audit technique",
        step_type: StepType::Expertise,
        due_in_days: 30,
        duration_minutes: 240,
    },
    StepTemplate {
        name: "Validation finale",
        step_type: StepType::Approval,
        due_in_days: 45,
        duration_minutes: 60,
    },
];

/// Pending steps for a dossier opened on `opened_on`
pub fn steps_for_dossier(dossier_id: Uuid, opened_on: NaiveDate) -> Vec<NewDossierStep> {
    STEP_TEMPLATES
        .iter()
        .zip(1..)
        .map(|(template, order)| NewDossierStep {
            dossier_id,
            step_order: order,
            step_name: template.name.to_string(),
            step_type: template.step_type.as_str().to_string(),
            status: StepStatus::Pending.as_str().to_string(),
            due_date: Some(opened_on + Duration::days(template.due_in_days)),
            estimated_duration_minutes: template.duration_minutes,
        })
        .collect()
}

/// `(current_step, progress)` for the dossier row: completed steps and mean step progress
pub fn dossier_progress(steps: &[DossierStep]) -> (i32, i32) {
    if steps.is_empty() {
        return (0, 0);
    }
    let completed = steps
        .iter()
        .filter(|s| s.status_enum() == StepStatus::Completed)
        .count() as i32;
    let total: i32 = steps.iter().map(|s| s.progress).sum();
    let mean = (total as f64 / steps.len() as f64).round() as i32;
    (completed.min(MAX_STEP), mean.clamp(0, 100))
}

impl StepChangeset {
    /// Completing a step forces progress to 100 and stamps `completed_at`
    pub fn from_request(request: &UpdateStepRequest, now: DateTime<Utc>) -> Self {
        let mut changeset = Self {
            status: request.status.map(|s| s.as_str().to_string()),
            progress: request.progress,
            due_date: request.due_date.map(Some),
            completed_at: None,
            updated_at: Some(now),
        };
        match request.status {
            Some(StepStatus::Completed) => {
                changeset.progress = Some(100);
                changeset.completed_at = Some(Some(now));
            },
            Some(_) => changeset.completed_at = Some(None),
            None => {},
        }
        changeset
    }
}

impl DossierStep {
    pub fn status_enum(&self) -> StepStatus {
        parse_or(&self.status, StepStatus::Pending)
    }

    pub async fn create_many(
        conn: &mut AsyncPgConnection,
        steps: &[NewDossierStep],
    ) -> QueryResult<usize> {
        if steps.is_empty() {
            return Ok(0);
        }
        diesel::insert_into(dossier_steps::table)
            .values(steps)
            .execute(conn)
            .await
    }

    pub async fn list_for_dossier(
        conn: &mut AsyncPgConnection,
        dossier_id: Uuid,
    ) -> QueryResult<Vec<Self>> {
        dossier_steps::table
            .filter(dossier_steps::dossier_id.eq(dossier_id))
            .order(dossier_steps::step_order.asc())
            .select(DossierStep::as_select())
            .load(conn)
            .await
    }

    pub async fn update_in_dossier(
        conn: &mut AsyncPgConnection,
        dossier_id: Uuid,
        step_id: Uuid,
        changeset: StepChangeset,
    ) -> QueryResult<Self> {
        diesel::update(
            dossier_steps::table
                .filter(dossier_steps::id.eq(step_id))
                .filter(dossier_steps::dossier_id.eq(dossier_id)),
        )
        .set(&changeset)
        .returning(DossierStep::as_returning())
        .get_result(conn)
        .await
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateStepRequest {
    pub status: Option<StepStatus>,
    #[validate(range(min = 0, max = 100, message = "Progress must be between 0 and 100"))]
    pub progress: Option<i32>,
    pub due_date: Option<NaiveDate>,
}

// Timeline

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, ToSchema)]
#[diesel(table_name = dossier_timeline)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DossierTimelineEvent {
    pub id: Uuid,
    pub dossier_id: Uuid,
    pub event_type: String,
    pub actor_type: String,
    pub actor_id: Option<Uuid>,
    pub actor_name: String,
    pub title: String,
    pub description: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = dossier_timeline)]
pub struct NewTimelineEvent {
    pub dossier_id: Uuid,
    pub event_type: String,
    pub actor_type: String,
    pub actor_id: Option<Uuid>,
    pub actor_name: String,
    pub title: String,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
}

impl NewTimelineEvent {
    /// Event recorded by the workflow itself
    pub fn system(dossier_id: Uuid, event_type: TimelineEventType, title: impl Into<String>) -> Self {
        Self {
            dossier_id,
            event_type: event_type.as_str().to_string(),
            actor_type: SYSTEM_ACTOR.to_string(),
            actor_id: None,
            actor_name: "Profitum".to_string(),
            title: title.into(),
            description: None,
            metadata: serde_json::json!({}),
        }
    }

    pub fn by(
        user: &AuthenticatedUser,
        dossier_id: Uuid,
        event_type: TimelineEventType,
        title: impl Into<String>,
    ) -> Self {
        Self {
            actor_type: user.user_type.as_str().to_string(),
            actor_id: Some(user.user_id),
            actor_name: user.email.clone(),
            ..Self::system(dossier_id, event_type, title)
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct TimelineQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    #[serde(rename = "type")]
    pub event_type: Option<TimelineEventType>,
    pub actor_type: Option<String>,
}

pub const DEFAULT_TIMELINE_LIMIT: i64 = 50;
const MAX_TIMELINE_LIMIT: i64 = 200;

impl TimelineQuery {
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_TIMELINE_LIMIT)
            .clamp(1, MAX_TIMELINE_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TimelinePage {
    pub events: Vec<DossierTimelineEvent>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateTimelineEventRequest {
    /// Defaults to `manual`
    pub event_type: Option<TimelineEventType>,
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

impl DossierTimelineEvent {
    pub async fn create(
        conn: &mut AsyncPgConnection,
        event: NewTimelineEvent,
    ) -> QueryResult<Self> {
        diesel::insert_into(dossier_timeline::table)
            .values(&event)
            .returning(DossierTimelineEvent::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn create_many(
        conn: &mut AsyncPgConnection,
        events: &[NewTimelineEvent],
    ) -> QueryResult<usize> {
        if events.is_empty() {
            return Ok(0);
        }
        diesel::insert_into(dossier_timeline::table)
            .values(events)
            .execute(conn)
            .await
    }

    /// Newest first
    pub async fn list(
        conn: &mut AsyncPgConnection,
        dossier_id: Uuid,
        query: &TimelineQuery,
    ) -> QueryResult<(Vec<Self>, i64)> {
        let build = || {
            let mut q = dossier_timeline::table
                .filter(dossier_timeline::dossier_id.eq(dossier_id))
                .into_boxed();
            if let Some(event_type) = query.event_type {
                q = q.filter(dossier_timeline::event_type.eq(event_type.as_str()));
            }
            if let Some(actor_type) = &query.actor_type {
                q = q.filter(dossier_timeline::actor_type.eq(actor_type.clone()));
            }
            q
        };

        let total: i64 = build().count().get_result(conn).await?;
        let events = build()
            .order(dossier_timeline::created_at.desc())
            .limit(query.limit())
            .offset(query.offset())
            .select(DossierTimelineEvent::as_select())
            .load(conn)
            .await?;
        Ok((events, total))
    }

    /// Number of rows removed; 0 when the event does not belong to the dossier
    pub async fn delete_in_dossier(
        conn: &mut AsyncPgConnection,
        dossier_id: Uuid,
        event_id: Uuid,
    ) -> QueryResult<usize> {
        diesel::delete(
            dossier_timeline::table
                .filter(dossier_timeline::id.eq(event_id))
                .filter(dossier_timeline::dossier_id.eq(dossier_id)),
        )
        .execute(conn)
        .await
    }
}

// Comments

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, ToSchema)]
#[diesel(table_name = dossier_comments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DossierComment {
    pub id: Uuid,
    pub dossier_id: Uuid,
    pub comment_type: String,
    pub category: String,
    pub content: String,
    pub created_by: Option<Uuid>,
    pub created_by_type: String,
    pub visible_to_expert: bool,
    pub visible_to_apporteur: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = dossier_comments)]
pub struct NewDossierComment {
    pub dossier_id: Uuid,
    pub comment_type: String,
    pub category: String,
    pub content: String,
    pub created_by: Option<Uuid>,
    pub created_by_type: String,
    pub visible_to_expert: bool,
    pub visible_to_apporteur: bool,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = dossier_comments)]
pub struct CommentChangeset {
    pub content: Option<String>,
    pub category: Option<String>,
    pub visible_to_expert: Option<bool>,
    pub visible_to_apporteur: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Which comments a reader may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentAudience {
    Everything,
    Expert,
    Apporteur,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 5000, message = "Comment must be 1-5000 characters"))]
    pub content: String,
    pub category: Option<CommentCategory>,
    pub visible_to_expert: Option<bool>,
    pub visible_to_apporteur: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1, max = 5000, message = "Comment must be 1-5000 characters"))]
    pub content: Option<String>,
    pub category: Option<CommentCategory>,
    pub visible_to_expert: Option<bool>,
    pub visible_to_apporteur: Option<bool>,
}

impl NewDossierComment {
    pub fn manual(user: &AuthenticatedUser, dossier_id: Uuid, request: CreateCommentRequest) -> Self {
        Self {
            dossier_id,
            comment_type: CommentType::Manual.as_str().to_string(),
            category: request
                .category
                .unwrap_or(CommentCategory::General)
                .as_str()
                .to_string(),
            content: request.content.trim().to_string(),
            created_by: Some(user.user_id),
            created_by_type: user.user_type.as_str().to_string(),
            visible_to_expert: request.visible_to_expert.unwrap_or(true),
            visible_to_apporteur: request.visible_to_apporteur.unwrap_or(true),
        }
    }
}

impl From<UpdateCommentRequest> for CommentChangeset {
    fn from(request: UpdateCommentRequest) -> Self {
        Self {
            content: request.content.map(|c| c.trim().to_string()),
            category: request.category.map(|c| c.as_str().to_string()),
            visible_to_expert: request.visible_to_expert,
            visible_to_apporteur: request.visible_to_apporteur,
            updated_at: Some(Utc::now()),
        }
    }
}

impl DossierComment {
    pub fn comment_type_enum(&self) -> CommentType {
        parse_or(&self.comment_type, CommentType::System)
    }

    pub fn is_visible_to(&self, audience: CommentAudience) -> bool {
        match audience {
            CommentAudience::Everything => true,
            CommentAudience::Expert => self.visible_to_expert,
            CommentAudience::Apporteur => self.visible_to_apporteur,
        }
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        comment: NewDossierComment,
    ) -> QueryResult<Self> {
        diesel::insert_into(dossier_comments::table)
            .values(&comment)
            .returning(DossierComment::as_returning())
            .get_result(conn)
            .await
    }

    /// Live comment of this dossier
    pub async fn find_in_dossier(
        conn: &mut AsyncPgConnection,
        dossier_id: Uuid,
        comment_id: Uuid,
    ) -> QueryResult<Self> {
        dossier_comments::table
            .filter(dossier_comments::id.eq(comment_id))
            .filter(dossier_comments::dossier_id.eq(dossier_id))
            .filter(dossier_comments::deleted_at.is_null())
            .select(DossierComment::as_select())
            .first(conn)
            .await
    }

    /// Newest first, soft-deleted rows excluded
    pub async fn list_for(
        conn: &mut AsyncPgConnection,
        dossier_id: Uuid,
        audience: CommentAudience,
        category: Option<CommentCategory>,
    ) -> QueryResult<Vec<Self>> {
        let mut query = dossier_comments::table
            .filter(dossier_comments::dossier_id.eq(dossier_id))
            .filter(dossier_comments::deleted_at.is_null())
            .into_boxed();
        match audience {
            CommentAudience::Everything => {},
            CommentAudience::Expert => {
                query = query.filter(dossier_comments::visible_to_expert.eq(true));
            },
            CommentAudience::Apporteur => {
                query = query.filter(dossier_comments::visible_to_apporteur.eq(true));
            },
        }
        if let Some(category) = category {
            query = query.filter(dossier_comments::category.eq(category.as_str()));
        }
        query
            .order(dossier_comments::created_at.desc())
            .select(DossierComment::as_select())
            .load(conn)
            .await
    }

    pub async fn update(
        conn: &mut AsyncPgConnection,
        comment_id: Uuid,
        changeset: CommentChangeset,
    ) -> QueryResult<Self> {
        diesel::update(dossier_comments::table.filter(dossier_comments::id.eq(comment_id)))
            .set(&changeset)
            .returning(DossierComment::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn soft_delete(conn: &mut AsyncPgConnection, comment_id: Uuid) -> QueryResult<usize> {
        let now = Utc::now();
        diesel::update(
            dossier_comments::table
                .filter(dossier_comments::id.eq(comment_id))
                .filter(dossier_comments::deleted_at.is_null()),
        )
        .set((
            dossier_comments::deleted_at.eq(Some(now)),
            dossier_comments::updated_at.eq(now),
        ))
        .execute(conn)
        .await
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct CommentFilter {
    pub category: Option<CommentCategory>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::UserType;

    fn step(order: i32, status: StepStatus, progress: i32) -> DossierStep {
        DossierStep {
            id: Uuid::new_v4(),
            dossier_id: Uuid::nil(),
            step_order: order,
            step_name: format!("Étape {}", order),
            step_type: StepType::Validation.as_str().into(),
            status: status.as_str().into(),
            progress,
            due_date: None,
            estimated_duration_minutes: 60,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_generated_steps_cover_every_dossier_step() {
        let opened = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let steps = steps_for_dossier(Uuid::nil(), opened);

        assert_eq!(steps.len(), MAX_STEP as usize);
        assert_eq!(
            steps.iter().map(|s| s.step_order).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert!(steps.iter().all(|s| s.status == "pending"));
        assert_eq!(steps[0].due_date, NaiveDate::from_ymd_opt(2025, 3, 3));
        assert!(steps.windows(2).all(|w| w[0].due_date < w[1].due_date));
        assert_eq!(steps[4].step_type, "approval");
    }

    #[test]
    fn test_dossier_progress_from_steps() {
        assert_eq!(dossier_progress(&[]), (0, 0));

        let steps = vec![
            step(1, StepStatus::Completed, 100),
            step(2, StepStatus::Completed, 100),
            step(3, StepStatus::InProgress, 50),
            step(4, StepStatus::Pending, 0),
            step(5, StepStatus::Pending, 0),
        ];
        assert_eq!(dossier_progress(&steps), (2, 50));
    }

    #[test]
    fn test_completing_a_step_stamps_it() {
        let now = Utc::now();
        let done = StepChangeset::from_request(
            &UpdateStepRequest {
                status: Some(StepStatus::Completed),
                progress: Some(40),
                due_date: None,
            },
            now,
        );
        assert_eq!(done.progress, Some(100));
        assert_eq!(done.completed_at, Some(Some(now)));

        let reopened = StepChangeset::from_request(
            &UpdateStepRequest {
                status: Some(StepStatus::InProgress),
                progress: None,
                due_date: None,
            },
            now,
        );
        assert_eq!(reopened.completed_at, Some(None));

        let untouched = StepChangeset::from_request(
            &UpdateStepRequest {
                status: None,
                progress: Some(10),
                due_date: None,
            },
            now,
        );
        assert!(untouched.completed_at.is_none());
        assert!(untouched.status.is_none());
    }

    #[test]
    fn test_timeline_query_bounds() {
        let query = TimelineQuery {
            limit: Some(10_000),
            offset: Some(-3),
            ..Default::default()
        };
        assert_eq!(query.limit(), 200);
        assert_eq!(query.offset(), 0);
        assert_eq!(TimelineQuery::default().limit(), DEFAULT_TIMELINE_LIMIT);

        let parsed: TimelineQuery =
            serde_json::from_value(serde_json::json!({"type": "comment"})).unwrap();
        assert_eq!(parsed.event_type, Some(TimelineEventType::Comment));
    }

    #[test]
    fn test_user_events_carry_actor() {
        let user = AuthenticatedUser {
            user_id: Uuid::new_v4(),
            token_id: "jti".into(),
            email: "expert@profitum.fr".into(),
            user_type: UserType::Expert,
            exp: u64::MAX,
        };
        let event = NewTimelineEvent::by(&user, Uuid::nil(), TimelineEventType::Manual, "Appel");
        assert_eq!(event.actor_type, "expert");
        assert_eq!(event.actor_id, Some(user.user_id));
        assert_eq!(event.actor_name, "expert@profitum.fr");

        let system = NewTimelineEvent::system(Uuid::nil(), TimelineEventType::DossierCreated, "x");
        assert_eq!(system.actor_type, SYSTEM_ACTOR);
        assert!(system.actor_id.is_none());
    }

    #[test]
    fn test_comment_defaults_and_visibility() {
        let user = AuthenticatedUser {
            user_id: Uuid::new_v4(),
            token_id: "jti".into(),
            email: "admin@profitum.fr".into(),
            user_type: UserType::Admin,
            exp: u64::MAX,
        };
        let comment = NewDossierComment::manual(
            &user,
            Uuid::nil(),
            CreateCommentRequest {
                content: "  Relancer le client  ".into(),
                category: None,
                visible_to_expert: None,
                visible_to_apporteur: Some(false),
            },
        );
        assert_eq!(comment.content, "Relancer le client");
        assert_eq!(comment.category, "general");
        assert_eq!(comment.comment_type, "manual");
        assert!(comment.visible_to_expert);
        assert!(!comment.visible_to_apporteur);

        let row = DossierComment {
            id: Uuid::new_v4(),
            dossier_id: Uuid::nil(),
            comment_type: comment.comment_type,
            category: comment.category,
            content: comment.content,
            created_by: comment.created_by,
            created_by_type: comment.created_by_type,
            visible_to_expert: true,
            visible_to_apporteur: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };
        assert!(row.is_visible_to(CommentAudience::Everything));
        assert!(row.is_visible_to(CommentAudience::Expert));
        assert!(!row.is_visible_to(CommentAudience::Apporteur));
        assert_eq!(row.comment_type_enum(), CommentType::Manual);
    }
}
