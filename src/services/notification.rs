// In-app notifications: delivery rules and per-user inbox operations

use diesel_async::AsyncPgConnection;
use tracing::{debug, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    db::DieselPool,
    middleware::auth::AuthenticatedUser,
    models::{
        auth::UserType,
        common::{Paginated, PaginationQuery},
        notification::{
            CreateNotificationRequest, NewNotification, Notification, NotificationFilter,
            NotificationPreferences, UpdatePreferencesRequest,
        },
        status::{parse_or, NotificationPriority},
    },
    utils::service_error::{OrNotFound, ServiceError, ServiceResult},
};

/// Whether a notification of this type and priority reaches the user.
/// Users without stored preferences receive everything.
pub fn should_deliver(
    prefs: Option<&NotificationPreferences>,
    notification_type: &str,
    priority: NotificationPriority,
) -> bool {
    prefs
        .map(|p| p.allows(notification_type, priority))
        .unwrap_or(true)
}

pub struct NotificationService {
    diesel_pool: DieselPool,
}

impl NotificationService {
    pub fn new(state: &AppState) -> Self {
        Self {
            diesel_pool: state.diesel_pool.clone(),
        }
    }

    /// Stores a notification unless the recipient's preferences filter it out.
    /// Runs on the caller's connection so it can join a transaction.
    pub async fn notify(
        conn: &mut AsyncPgConnection,
        notification: NewNotification,
    ) -> ServiceResult<Option<Notification>> {
        let prefs = NotificationPreferences::find(conn, notification.user_id).await?;
        let priority = parse_or(&notification.priority, NotificationPriority::Medium);
        if !should_deliver(prefs.as_ref(), &notification.notification_type, priority) {
            debug!(
                user_id = %notification.user_id,
                notification_type = %notification.notification_type,
                "Notification skipped by user preferences"
            );
            return Ok(None);
        }
        Ok(Some(Notification::create(conn, notification).await?))
    }

    /// Fan-out variant of `notify`; returns how many were stored
    pub async fn notify_many(
        conn: &mut AsyncPgConnection,
        notifications: Vec<NewNotification>,
    ) -> ServiceResult<usize> {
        let mut deliverable = Vec::with_capacity(notifications.len());
        for notification in notifications {
            let prefs = NotificationPreferences::find(conn, notification.user_id).await?;
            let priority = parse_or(&notification.priority, NotificationPriority::Medium);
            if should_deliver(prefs.as_ref(), &notification.notification_type, priority) {
                deliverable.push(notification);
            }
        }
        Ok(Notification::create_many(conn, &deliverable).await?)
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn create(
        &self,
        user: &AuthenticatedUser,
        request: CreateNotificationRequest,
    ) -> ServiceResult<Option<Notification>> {
        request.validate()?;

        let (target_id, target_type) = match (request.user_id, user.is_admin()) {
            (Some(target), true) => (target, request.user_type.unwrap_or(UserType::Client)),
            (Some(target), false) if target != user.user_id => {
                return Err(ServiceError::Forbidden(
                    "Only administrators can notify other users".to_string(),
                ))
            },
            _ => (user.user_id, user.user_type),
        };

        let mut notification = NewNotification::new(
            target_id,
            target_type,
            &request.notification_type,
            request.title,
            request.message,
        )
        .priority(request.priority.unwrap_or(NotificationPriority::Medium));
        if let Some(url) = request.action_url {
            notification = notification.action_url(url);
        }
        if let Some(metadata) = request.metadata {
            notification = notification.metadata(metadata);
        }

        let mut conn = self.diesel_pool.get().await?;
        let created = Self::notify(&mut conn, notification).await?;
        if let Some(n) = &created {
            info!(notification_id = %n.id, "Notification created");
        }
        Ok(created)
    }

    #[instrument(skip(self, user, filter, page), fields(user_id = %user.user_id))]
    pub async fn list(
        &self,
        user: &AuthenticatedUser,
        filter: &NotificationFilter,
        page: &PaginationQuery,
    ) -> ServiceResult<Paginated<Notification>> {
        let mut conn = self.diesel_pool.get().await?;
        let (items, total) = Notification::list_for_user(&mut conn, user.user_id, filter, page).await?;
        Ok(Paginated::new(items, page, total))
    }

    pub async fn unread_count(&self, user: &AuthenticatedUser) -> ServiceResult<i64> {
        let mut conn = self.diesel_pool.get().await?;
        Ok(Notification::unread_count(&mut conn, user.user_id).await?)
    }

    pub async fn mark_read(&self, user: &AuthenticatedUser, id: Uuid) -> ServiceResult<Notification> {
        let mut conn = self.diesel_pool.get().await?;
        Notification::mark_read(&mut conn, id, user.user_id)
            .await
            .or_not_found("Notification")
    }

    pub async fn set_starred(
        &self,
        user: &AuthenticatedUser,
        id: Uuid,
        starred: bool,
    ) -> ServiceResult<Notification> {
        let mut conn = self.diesel_pool.get().await?;
        Notification::set_starred(&mut conn, id, user.user_id, starred)
            .await
            .or_not_found("Notification")
    }

    pub async fn archive(&self, user: &AuthenticatedUser, id: Uuid) -> ServiceResult<Notification> {
        let mut conn = self.diesel_pool.get().await?;
        Notification::archive(&mut conn, id, user.user_id)
            .await
            .or_not_found("Notification")
    }

    pub async fn unarchive(&self, user: &AuthenticatedUser, id: Uuid) -> ServiceResult<Notification> {
        let mut conn = self.diesel_pool.get().await?;
        Notification::unarchive(&mut conn, id, user.user_id)
            .await
            .or_not_found("Notification")
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn mark_all_read(&self, user: &AuthenticatedUser) -> ServiceResult<usize> {
        let mut conn = self.diesel_pool.get().await?;
        Ok(Notification::mark_all_read(&mut conn, user.user_id).await?)
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn delete_all_read(&self, user: &AuthenticatedUser) -> ServiceResult<usize> {
        let mut conn = self.diesel_pool.get().await?;
        Ok(Notification::delete_all_read(&mut conn, user.user_id).await?)
    }

    pub async fn delete(&self, user: &AuthenticatedUser, id: Uuid) -> ServiceResult<()> {
        let mut conn = self.diesel_pool.get().await?;
        match Notification::delete(&mut conn, id, user.user_id).await? {
            0 => Err(ServiceError::NotFound("Notification")),
            _ => Ok(()),
        }
    }

    pub async fn preferences(&self, user: &AuthenticatedUser) -> ServiceResult<NotificationPreferences> {
        let mut conn = self.diesel_pool.get().await?;
        Ok(NotificationPreferences::find(&mut conn, user.user_id)
            .await?
            .unwrap_or_else(|| NotificationPreferences::defaults(user.user_id, user.user_type)))
    }

    #[instrument(skip(self, user, update), fields(user_id = %user.user_id))]
    pub async fn update_preferences(
        &self,
        user: &AuthenticatedUser,
        update: UpdatePreferencesRequest,
    ) -> ServiceResult<NotificationPreferences> {
        let mut conn = self.diesel_pool.get().await?;
        let current = NotificationPreferences::find(&mut conn, user.user_id)
            .await?
            .unwrap_or_else(|| NotificationPreferences::defaults(user.user_id, user.user_type));
        let updated = current.apply(update);
        Ok(NotificationPreferences::upsert(&mut conn, &updated).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::kinds;

    #[test]
    fn test_missing_preferences_deliver_everything() {
        assert!(should_deliver(None, kinds::RDV_PROPOSED, NotificationPriority::Low));
    }

    #[test]
    fn test_disabled_type_is_skipped_unless_urgent() {
        let mut prefs = NotificationPreferences::defaults(Uuid::new_v4(), UserType::Expert);
        prefs.disabled_types = vec![kinds::RDV_PROPOSED.to_string()];

        assert!(!should_deliver(Some(&prefs), kinds::RDV_PROPOSED, NotificationPriority::High));
        assert!(should_deliver(Some(&prefs), kinds::RDV_PROPOSED, NotificationPriority::Urgent));
        assert!(should_deliver(Some(&prefs), kinds::DOSSIER_ASSIGNED, NotificationPriority::Low));
    }

    #[test]
    fn test_in_app_disabled_blocks_non_urgent() {
        let mut prefs = NotificationPreferences::defaults(Uuid::new_v4(), UserType::Client);
        prefs.in_app_enabled = false;

        assert!(!should_deliver(Some(&prefs), kinds::SYSTEM, NotificationPriority::Medium));
        assert!(should_deliver(Some(&prefs), kinds::SYSTEM, NotificationPriority::Urgent));
    }
}
