// In-app notifications and per-user delivery preferences

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::auth::UserType;
use crate::models::common::PaginationQuery;
use crate::models::status::{NotificationPriority, NotificationStatus};
use crate::schema::{notification_preferences, notifications};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, ToSchema)]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_type: String,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub priority: String,
    pub status: String,
    pub is_read: bool,
    pub starred: bool,
    pub action_url: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub read_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub user_type: String,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub priority: String,
    pub status: String,
    pub action_url: Option<String>,
    pub metadata: serde_json::Value,
}

impl NewNotification {
    pub fn new(
        user_id: Uuid,
        user_type: UserType,
        notification_type: &str,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            user_type: user_type.as_str().to_string(),
            notification_type: notification_type.to_string(),
            title: title.into(),
            message: message.into(),
            priority: NotificationPriority::Medium.as_str().to_string(),
            status: NotificationStatus::Unread.as_str().to_string(),
            action_url: None,
            metadata: serde_json::json!({}),
        }
    }

    pub fn priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority.as_str().to_string();
        self
    }

    pub fn action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Notification types emitted by the platform
pub mod kinds {
    pub const EXPERT_APPROVED: &str = "expert_approved";
    pub const EXPERT_REJECTED: &str = "expert_rejected";
    pub const DOSSIER_STATUS_CHANGED: &str = "dossier_status_changed";
    pub const DOSSIER_ASSIGNED: &str = "dossier_assigned";
    pub const RDV_PROPOSED: &str = "rdv_proposed";
    pub const RDV_CONFIRMED: &str = "rdv_confirmed";
    pub const RDV_ALTERNATIVE_PROPOSED: &str = "rdv_alternative_proposed";
    pub const RDV_REFUSED: &str = "rdv_refused";
    pub const RDV_COMPLETED: &str = "rdv_completed";
    pub const RDV_CANCELLED: &str = "rdv_cancelled";
    pub const DOCUMENT_VALIDATED: &str = "document_validated";
    pub const DOCUMENT_REJECTED: &str = "document_rejected";
    pub const HIGH_ELIGIBILITY_LEAD: &str = "high_eligibility_lead";
    pub const NEW_CLIENT_FROM_SIMULATOR: &str = "new_client_from_simulator";
    pub const SYSTEM: &str = "system";
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateNotificationRequest {
    /// Admins may target another user; ignored otherwise
    pub user_id: Option<Uuid>,
    pub user_type: Option<UserType>,
    #[validate(length(min = 1, max = 100, message = "Type is required"))]
    pub notification_type: String,
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 5000, message = "Message is required"))]
    pub message: String,
    pub priority: Option<NotificationPriority>,
    #[validate(length(max = 2000))]
    pub action_url: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StarRequest {
    pub starred: bool,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct NotificationFilter {
    #[serde(rename = "type")]
    pub notification_type: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub read: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable, AsChangeset, ToSchema)]
#[diesel(table_name = notification_preferences)]
#[diesel(primary_key(user_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NotificationPreferences {
    pub user_id: Uuid,
    pub user_type: String,
    pub in_app_enabled: bool,
    pub email_enabled: bool,
    pub push_enabled: bool,
    pub disabled_types: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdatePreferencesRequest {
    pub in_app_enabled: Option<bool>,
    pub email_enabled: Option<bool>,
    pub push_enabled: Option<bool>,
    pub disabled_types: Option<Vec<String>>,
}

impl NotificationPreferences {
    pub fn defaults(user_id: Uuid, user_type: UserType) -> Self {
        Self {
            user_id,
            user_type: user_type.as_str().to_string(),
            in_app_enabled: true,
            email_enabled: true,
            push_enabled: false,
            disabled_types: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Urgent notifications bypass user preferences
    pub fn allows(&self, notification_type: &str, priority: NotificationPriority) -> bool {
        if priority == NotificationPriority::Urgent {
            return true;
        }
        self.in_app_enabled && !self.disabled_types.iter().any(|t| t == notification_type)
    }

    pub fn apply(mut self, update: UpdatePreferencesRequest) -> Self {
        if let Some(v) = update.in_app_enabled {
            self.in_app_enabled = v;
        }
        if let Some(v) = update.email_enabled {
            self.email_enabled = v;
        }
        if let Some(v) = update.push_enabled {
            self.push_enabled = v;
        }
        if let Some(mut types) = update.disabled_types {
            types.sort();
            types.dedup();
            self.disabled_types = types;
        }
        self.updated_at = Utc::now();
        self
    }

    pub async fn find(conn: &mut AsyncPgConnection, user_id: Uuid) -> QueryResult<Option<Self>> {
        notification_preferences::table
            .filter(notification_preferences::user_id.eq(user_id))
            .select(NotificationPreferences::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn upsert(conn: &mut AsyncPgConnection, prefs: &Self) -> QueryResult<Self> {
        diesel::insert_into(notification_preferences::table)
            .values(prefs)
            .on_conflict(notification_preferences::user_id)
            .do_update()
            .set(prefs)
            .returning(NotificationPreferences::as_returning())
            .get_result(conn)
            .await
    }
}

impl Notification {
    pub async fn create(conn: &mut AsyncPgConnection, new: NewNotification) -> QueryResult<Self> {
        diesel::insert_into(notifications::table)
            .values(&new)
            .returning(Notification::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn create_many(
        conn: &mut AsyncPgConnection,
        rows: &[NewNotification],
    ) -> QueryResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        diesel::insert_into(notifications::table)
            .values(rows)
            .execute(conn)
            .await
    }

    pub async fn find_for_user(
        conn: &mut AsyncPgConnection,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> QueryResult<Self> {
        notifications::table
            .filter(notifications::id.eq(notification_id))
            .filter(notifications::user_id.eq(user_id))
            .select(Notification::as_select())
            .first(conn)
            .await
    }

    pub async fn list_for_user(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        filter: &NotificationFilter,
        page: &PaginationQuery,
    ) -> QueryResult<(Vec<Self>, i64)> {
        let build = || {
            let mut query = notifications::table
                .filter(notifications::user_id.eq(user_id))
                .into_boxed();
            if let Some(kind) = &filter.notification_type {
                query = query.filter(notifications::notification_type.eq(kind.clone()));
            }
            if let Some(priority) = &filter.priority {
                query = query.filter(notifications::priority.eq(priority.clone()));
            }
            match &filter.status {
                Some(status) => query = query.filter(notifications::status.eq(status.clone())),
                None => {
                    query = query
                        .filter(notifications::status.ne(NotificationStatus::Archived.as_str()))
                }
            }
            if let Some(read) = filter.read {
                query = query.filter(notifications::is_read.eq(read));
            }
            query
        };

        let total: i64 = build().count().get_result(conn).await?;
        let items = build()
            .order(notifications::created_at.desc())
            .limit(page.limit())
            .offset(page.offset())
            .select(Notification::as_select())
            .load(conn)
            .await?;
        Ok((items, total))
    }

    pub async fn unread_count(conn: &mut AsyncPgConnection, user_id: Uuid) -> QueryResult<i64> {
        notifications::table
            .filter(notifications::user_id.eq(user_id))
            .filter(notifications::is_read.eq(false))
            .filter(notifications::status.ne(NotificationStatus::Archived.as_str()))
            .count()
            .get_result(conn)
            .await
    }

    pub async fn mark_read(
        conn: &mut AsyncPgConnection,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> QueryResult<Self> {
        let now = Utc::now();
        diesel::update(
            notifications::table
                .filter(notifications::id.eq(notification_id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .set((
            notifications::is_read.eq(true),
            notifications::status.eq(NotificationStatus::Read.as_str()),
            notifications::read_at.eq(Some(now)),
            notifications::updated_at.eq(now),
        ))
        .returning(Notification::as_returning())
        .get_result(conn)
        .await
    }

    pub async fn set_starred(
        conn: &mut AsyncPgConnection,
        notification_id: Uuid,
        user_id: Uuid,
        starred: bool,
    ) -> QueryResult<Self> {
        diesel::update(
            notifications::table
                .filter(notifications::id.eq(notification_id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .set((
            notifications::starred.eq(starred),
            notifications::updated_at.eq(Utc::now()),
        ))
        .returning(Notification::as_returning())
        .get_result(conn)
        .await
    }

    pub async fn archive(
        conn: &mut AsyncPgConnection,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> QueryResult<Self> {
        let now = Utc::now();
        diesel::update(
            notifications::table
                .filter(notifications::id.eq(notification_id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .set((
            notifications::status.eq(NotificationStatus::Archived.as_str()),
            notifications::archived_at.eq(Some(now)),
            notifications::updated_at.eq(now),
        ))
        .returning(Notification::as_returning())
        .get_result(conn)
        .await
    }

    /// Restored notifications come back as read
    pub async fn unarchive(
        conn: &mut AsyncPgConnection,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> QueryResult<Self> {
        let now = Utc::now();
        diesel::update(
            notifications::table
                .filter(notifications::id.eq(notification_id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .set((
            notifications::status.eq(NotificationStatus::Read.as_str()),
            notifications::is_read.eq(true),
            notifications::archived_at.eq(None::<DateTime<Utc>>),
            notifications::updated_at.eq(now),
        ))
        .returning(Notification::as_returning())
        .get_result(conn)
        .await
    }

    pub async fn mark_all_read(conn: &mut AsyncPgConnection, user_id: Uuid) -> QueryResult<usize> {
        let now = Utc::now();
        diesel::update(
            notifications::table
                .filter(notifications::user_id.eq(user_id))
                .filter(notifications::is_read.eq(false))
                .filter(notifications::status.ne(NotificationStatus::Archived.as_str())),
        )
        .set((
            notifications::is_read.eq(true),
            notifications::status.eq(NotificationStatus::Read.as_str()),
            notifications::read_at.eq(Some(now)),
            notifications::updated_at.eq(now),
        ))
        .execute(conn)
        .await
    }

    pub async fn delete_all_read(conn: &mut AsyncPgConnection, user_id: Uuid) -> QueryResult<usize> {
        diesel::delete(
            notifications::table
                .filter(notifications::user_id.eq(user_id))
                .filter(notifications::is_read.eq(true)),
        )
        .execute(conn)
        .await
    }

    pub async fn delete(
        conn: &mut AsyncPgConnection,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> QueryResult<usize> {
        diesel::delete(
            notifications::table
                .filter(notifications::id.eq(notification_id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .execute(conn)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferences_gate_by_type_and_channel() {
        let mut prefs = NotificationPreferences::defaults(Uuid::new_v4(), UserType::Client);
        assert!(prefs.allows(kinds::RDV_CONFIRMED, NotificationPriority::Medium));

        prefs.disabled_types = vec![kinds::RDV_CONFIRMED.to_string()];
        assert!(!prefs.allows(kinds::RDV_CONFIRMED, NotificationPriority::High));
        assert!(prefs.allows(kinds::RDV_CONFIRMED, NotificationPriority::Urgent));

        prefs.disabled_types.clear();
        prefs.in_app_enabled = false;
        assert!(!prefs.allows(kinds::SYSTEM, NotificationPriority::Low));
        assert!(prefs.allows(kinds::SYSTEM, NotificationPriority::Urgent));
    }

    #[test]
    fn test_apply_dedups_disabled_types() {
        let prefs = NotificationPreferences::defaults(Uuid::new_v4(), UserType::Expert).apply(
            UpdatePreferencesRequest {
                in_app_enabled: None,
                email_enabled: Some(false),
                push_enabled: None,
                disabled_types: Some(vec!["b".into(), "a".into(), "b".into()]),
            },
        );
        assert!(prefs.in_app_enabled);
        assert!(!prefs.email_enabled);
        assert_eq!(prefs.disabled_types, vec!["a", "b"]);
    }

    #[test]
    fn test_builder_defaults() {
        let n = NewNotification::new(Uuid::new_v4(), UserType::Apporteur, kinds::SYSTEM, "t", "m")
            .priority(NotificationPriority::High)
            .action_url("/rdv/1");
        assert_eq!(n.user_type, "apporteur");
        assert_eq!(n.priority, "high");
        assert_eq!(n.status, "unread");
        assert_eq!(n.action_url.as_deref(), Some("/rdv/1"));
    }
}
