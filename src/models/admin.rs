use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::common::{lower, normalize_email, StatusCounts};
use crate::schema::admins;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, ToSchema)]
#[diesel(table_name = admins)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Admin {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub name: String,
    pub role: String,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Platform-wide counters for the admin home page
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminDashboard {
    pub clients: StatusCounts,
    pub experts: StatusCounts,
    pub apporteurs: StatusCounts,
    pub dossiers: StatusCounts,
    pub dossiers_total_amount: f64,
    pub upcoming_rdvs: i64,
    pub open_simulator_sessions: i64,
}

impl Admin {
    pub async fn find_by_id(conn: &mut AsyncPgConnection, admin_id: Uuid) -> QueryResult<Self> {
        admins::table
            .filter(admins::id.eq(admin_id))
            .select(Admin::as_select())
            .first(conn)
            .await
    }

    pub async fn find_by_email(conn: &mut AsyncPgConnection, email: &str) -> QueryResult<Self> {
        admins::table
            .filter(lower(admins::email).eq(normalize_email(email)))
            .select(Admin::as_select())
            .first(conn)
            .await
    }

    /// Active admin ids, used to fan out platform alerts
    pub async fn active_ids(conn: &mut AsyncPgConnection) -> QueryResult<Vec<Uuid>> {
        admins::table
            .filter(admins::is_active.eq(true))
            .select(admins::id)
            .load(conn)
            .await
    }

    pub async fn update_password(
        conn: &mut AsyncPgConnection,
        admin_id: Uuid,
        password_hash: &str,
    ) -> QueryResult<usize> {
        diesel::update(admins::table.filter(admins::id.eq(admin_id)))
            .set((
                admins::password_hash.eq(password_hash),
                admins::updated_at.eq(Utc::now()),
            ))
            .execute(conn)
            .await
    }

    pub async fn record_login(conn: &mut AsyncPgConnection, admin_id: Uuid) -> QueryResult<usize> {
        diesel::update(admins::table.filter(admins::id.eq(admin_id)))
            .set(admins::last_login.eq(Some(Utc::now())))
            .execute(conn)
            .await
    }
}
