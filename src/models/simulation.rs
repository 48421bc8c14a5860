// Simulator rows: anonymous sessions, questionnaire, answers, eligibility results,
// plus the saved simulations of registered clients

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::utils::validation::{
    validate_password_strength, PHONE_REGEX, POSTAL_CODE_REGEX, SIREN_REGEX,
};
use crate::schema::{
    questionnaire_questions, simulations, temporary_eligibilities, temporary_responses,
    temporary_sessions,
};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, ToSchema)]
#[diesel(table_name = temporary_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TemporarySession {
    pub id: Uuid,
    pub session_token: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub completed: bool,
    pub abandoned: bool,
    pub migrated_to_account: bool,
    pub migrated_at: Option<DateTime<Utc>>,
    pub client_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = temporary_sessions)]
pub struct NewTemporarySession {
    pub session_token: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl NewTemporarySession {
    pub fn new(ip_address: Option<String>, user_agent: Option<String>, ttl_hours: i64) -> Self {
        Self {
            session_token: Uuid::new_v4().simple().to_string(),
            ip_address,
            user_agent,
            expires_at: Utc::now() + Duration::hours(ttl_hours),
        }
    }
}

/// Why a session cannot be turned into an account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationBlocker {
    NotCompleted,
    AlreadyMigrated,
    Expired,
}

impl MigrationBlocker {
    pub fn message(&self) -> &'static str {
        match self {
            MigrationBlocker::NotCompleted => "Simulation is not completed",
            MigrationBlocker::AlreadyMigrated => "Session has already been migrated",
            MigrationBlocker::Expired => "Session has expired",
        }
    }
}

impl TemporarySession {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Still accepting answers
    pub fn is_open(&self) -> bool {
        !self.is_expired() && !self.abandoned && !self.migrated_to_account
    }

    pub fn can_migrate(&self) -> Result<(), MigrationBlocker> {
        if self.migrated_to_account {
            return Err(MigrationBlocker::AlreadyMigrated);
        }
        if self.is_expired() {
            return Err(MigrationBlocker::Expired);
        }
        if !self.completed {
            return Err(MigrationBlocker::NotCompleted);
        }
        Ok(())
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_session: NewTemporarySession,
    ) -> QueryResult<Self> {
        diesel::insert_into(temporary_sessions::table)
            .values(&new_session)
            .returning(TemporarySession::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn find_by_id(conn: &mut AsyncPgConnection, session_id: Uuid) -> QueryResult<Self> {
        temporary_sessions::table
            .filter(temporary_sessions::id.eq(session_id))
            .select(TemporarySession::as_select())
            .first(conn)
            .await
    }

    pub async fn find_by_token(conn: &mut AsyncPgConnection, token: &str) -> QueryResult<Self> {
        temporary_sessions::table
            .filter(temporary_sessions::session_token.eq(token))
            .select(TemporarySession::as_select())
            .first(conn)
            .await
    }

    /// Accepts either the session id or its token. Tokens are 32 hex chars,
    /// which `Uuid::parse_str` also accepts, so both columns are checked.
    pub async fn find_by_reference(
        conn: &mut AsyncPgConnection,
        reference: &str,
    ) -> QueryResult<Self> {
        match Uuid::parse_str(reference) {
            Ok(id) => {
                temporary_sessions::table
                    .filter(
                        temporary_sessions::id
                            .eq(id)
                            .or(temporary_sessions::session_token.eq(reference)),
                    )
                    .select(TemporarySession::as_select())
                    .first(conn)
                    .await
            },
            Err(_) => Self::find_by_token(conn, reference).await,
        }
    }

    pub async fn mark_completed(conn: &mut AsyncPgConnection, session_id: Uuid) -> QueryResult<usize> {
        diesel::update(temporary_sessions::table.filter(temporary_sessions::id.eq(session_id)))
            .set((
                temporary_sessions::completed.eq(true),
                temporary_sessions::updated_at.eq(Utc::now()),
            ))
            .execute(conn)
            .await
    }

    pub async fn mark_abandoned(conn: &mut AsyncPgConnection, session_id: Uuid) -> QueryResult<usize> {
        diesel::update(temporary_sessions::table.filter(temporary_sessions::id.eq(session_id)))
            .set((
                temporary_sessions::abandoned.eq(true),
                temporary_sessions::updated_at.eq(Utc::now()),
            ))
            .execute(conn)
            .await
    }

    pub async fn mark_migrated(
        conn: &mut AsyncPgConnection,
        session_id: Uuid,
        client_id: Uuid,
    ) -> QueryResult<usize> {
        let now = Utc::now();
        diesel::update(
            temporary_sessions::table
                .filter(temporary_sessions::id.eq(session_id))
                .filter(temporary_sessions::migrated_to_account.eq(false)),
        )
        .set((
            temporary_sessions::migrated_to_account.eq(true),
            temporary_sessions::migrated_at.eq(Some(now)),
            temporary_sessions::client_id.eq(Some(client_id)),
            temporary_sessions::updated_at.eq(now),
        ))
        .execute(conn)
        .await
    }

    /// Returns (total, completed, migrated)
    pub async fn counts(conn: &mut AsyncPgConnection) -> QueryResult<(i64, i64, i64)> {
        let total: i64 = temporary_sessions::table.count().get_result(conn).await?;
        let completed: i64 = temporary_sessions::table
            .filter(temporary_sessions::completed.eq(true))
            .count()
            .get_result(conn)
            .await?;
        let migrated: i64 = temporary_sessions::table
            .filter(temporary_sessions::migrated_to_account.eq(true))
            .count()
            .get_result(conn)
            .await?;
        Ok((total, completed, migrated))
    }

    /// Sessions still usable by anonymous visitors
    pub async fn count_open(conn: &mut AsyncPgConnection) -> QueryResult<i64> {
        temporary_sessions::table
            .filter(temporary_sessions::expires_at.gt(Utc::now()))
            .filter(temporary_sessions::migrated_to_account.eq(false))
            .filter(temporary_sessions::abandoned.eq(false))
            .count()
            .get_result(conn)
            .await
    }

    /// Deletes expired, never-migrated sessions; dependent rows cascade
    pub async fn delete_expired(conn: &mut AsyncPgConnection) -> QueryResult<usize> {
        diesel::delete(
            temporary_sessions::table
                .filter(temporary_sessions::expires_at.lt(Utc::now()))
                .filter(temporary_sessions::migrated_to_account.eq(false)),
        )
        .execute(conn)
        .await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, ToSchema)]
#[diesel(table_name = questionnaire_questions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct QuestionnaireQuestion {
    pub id: Uuid,
    pub code: String,
    pub question_text: String,
    pub question_type: String,
    #[schema(value_type = Object)]
    pub options: serde_json::Value,
    pub question_order: i32,
    pub produits_cibles: Vec<String>,
    #[schema(value_type = Option<Object>)]
    pub depends_on: Option<serde_json::Value>,
    pub required: bool,
}

impl QuestionnaireQuestion {
    pub async fn list_ordered(conn: &mut AsyncPgConnection) -> QueryResult<Vec<Self>> {
        questionnaire_questions::table
            .order(questionnaire_questions::question_order.asc())
            .select(QuestionnaireQuestion::as_select())
            .load(conn)
            .await
    }

    pub async fn find_by_id(conn: &mut AsyncPgConnection, question_id: Uuid) -> QueryResult<Self> {
        questionnaire_questions::table
            .filter(questionnaire_questions::id.eq(question_id))
            .select(QuestionnaireQuestion::as_select())
            .first(conn)
            .await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, ToSchema)]
#[diesel(table_name = temporary_responses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TemporaryResponse {
    pub id: Uuid,
    pub session_id: Uuid,
    pub question_id: Uuid,
    #[schema(value_type = Object)]
    pub response_value: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = temporary_responses)]
pub struct NewTemporaryResponse {
    pub session_id: Uuid,
    pub question_id: Uuid,
    pub response_value: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SaveResponseRequest {
    #[validate(length(min = 1, max = 64, message = "Session token is required"))]
    pub session_token: String,
    pub question_id: Uuid,
    #[schema(value_type = Object)]
    pub response_value: serde_json::Value,
}

impl TemporaryResponse {
    /// One answer per (session, question); a new answer replaces the previous one
    pub async fn upsert(
        conn: &mut AsyncPgConnection,
        response: NewTemporaryResponse,
    ) -> QueryResult<Self> {
        diesel::insert_into(temporary_responses::table)
            .values(&response)
            .on_conflict((temporary_responses::session_id, temporary_responses::question_id))
            .do_update()
            .set((
                temporary_responses::response_value.eq(excluded(temporary_responses::response_value)),
                temporary_responses::created_at.eq(Utc::now()),
            ))
            .returning(TemporaryResponse::as_returning())
            .get_result(conn)
            .await
    }

    /// Answers keyed by question code, in questionnaire order
    pub async fn answers_for_session(
        conn: &mut AsyncPgConnection,
        session_id: Uuid,
    ) -> QueryResult<Vec<(String, serde_json::Value)>> {
        temporary_responses::table
            .inner_join(questionnaire_questions::table)
            .filter(temporary_responses::session_id.eq(session_id))
            .order(questionnaire_questions::question_order.asc())
            .select((
                questionnaire_questions::code,
                temporary_responses::response_value,
            ))
            .load(conn)
            .await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, ToSchema)]
#[diesel(table_name = temporary_eligibilities)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TemporaryEligibility {
    pub id: Uuid,
    pub session_id: Uuid,
    pub produit_code: String,
    pub produit_nom: String,
    pub is_eligible: bool,
    pub eligibility_score: i32,
    pub estimated_savings: Option<f64>,
    pub confidence_level: String,
    #[schema(value_type = Object)]
    pub calculation_details: serde_json::Value,
    pub recommendations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = temporary_eligibilities)]
pub struct NewTemporaryEligibility {
    pub session_id: Uuid,
    pub produit_code: String,
    pub produit_nom: String,
    pub is_eligible: bool,
    pub eligibility_score: i32,
    pub estimated_savings: Option<f64>,
    pub confidence_level: String,
    pub calculation_details: serde_json::Value,
    pub recommendations: Vec<String>,
}

impl TemporaryEligibility {
    /// Replaces any previous results of the session
    pub async fn replace_for_session(
        conn: &mut AsyncPgConnection,
        session_id: Uuid,
        rows: &[NewTemporaryEligibility],
    ) -> QueryResult<Vec<Self>> {
        diesel::delete(
            temporary_eligibilities::table.filter(temporary_eligibilities::session_id.eq(session_id)),
        )
        .execute(conn)
        .await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        diesel::insert_into(temporary_eligibilities::table)
            .values(rows)
            .returning(TemporaryEligibility::as_returning())
            .get_results(conn)
            .await
    }

    /// Best score first
    pub async fn list_for_session(
        conn: &mut AsyncPgConnection,
        session_id: Uuid,
    ) -> QueryResult<Vec<Self>> {
        temporary_eligibilities::table
            .filter(temporary_eligibilities::session_id.eq(session_id))
            .order((
                temporary_eligibilities::eligibility_score.desc(),
                temporary_eligibilities::produit_code.asc(),
            ))
            .select(TemporaryEligibility::as_select())
            .load(conn)
            .await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, ToSchema)]
#[diesel(table_name = simulations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Simulation {
    pub id: Uuid,
    pub client_id: Uuid,
    #[schema(value_type = Object)]
    pub answers: serde_json::Value,
    #[schema(value_type = Object)]
    pub results: serde_json::Value,
    pub source: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = simulations)]
pub struct NewSimulation {
    pub client_id: Uuid,
    pub answers: serde_json::Value,
    pub results: serde_json::Value,
    pub source: String,
    pub status: String,
}

pub const SIMULATION_COMPLETED: &str = "completed";

impl Simulation {
    pub async fn create(conn: &mut AsyncPgConnection, new_simulation: NewSimulation) -> QueryResult<Self> {
        diesel::insert_into(simulations::table)
            .values(&new_simulation)
            .returning(Simulation::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn list_for_client(
        conn: &mut AsyncPgConnection,
        client_id: Uuid,
    ) -> QueryResult<Vec<Self>> {
        simulations::table
            .filter(simulations::client_id.eq(client_id))
            .order(simulations::created_at.desc())
            .select(Simulation::as_select())
            .load(conn)
            .await
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionCreated {
    pub session_id: Uuid,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Identifies a session by id or token
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SessionReferenceRequest {
    #[validate(length(min = 1, max = 64, message = "Session reference is required"))]
    #[serde(alias = "session_token")]
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EligibilityResults {
    pub session_id: Uuid,
    pub session_token: String,
    pub completed: bool,
    pub results: Vec<TemporaryEligibility>,
    pub total_savings: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SimulatorStats {
    pub total_sessions: i64,
    pub completed_sessions: i64,
    pub migrated_sessions: i64,
    pub open_sessions: i64,
    /// Migrated sessions as a percentage of all sessions
    pub conversion_rate: f64,
    pub completion_rate: f64,
}

/// Percentage rounded to two decimals; 0 when there is nothing to compare against
pub fn rate(part: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 10_000.0).round() / 100.0
}

/// Answers posted by (or for) a registered client, keyed by question code
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RunSimulationRequest {
    #[schema(value_type = Object)]
    pub answers: serde_json::Map<String, serde_json::Value>,
}

/// Registration data sent when a simulator visitor creates an account
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct MigrateSessionRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(custom = "validate_password_strength")]
    pub password: String,
    #[validate(length(min = 1, max = 255, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, max = 255, message = "Company name is required"))]
    pub company_name: String,
    #[validate(regex(path = "PHONE_REGEX", message = "Invalid phone number"))]
    pub phone_number: Option<String>,
    #[validate(regex(path = "SIREN_REGEX", message = "SIREN must contain 9 digits"))]
    pub siren: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 255))]
    pub city: Option<String>,
    #[validate(regex(path = "POSTAL_CODE_REGEX", message = "Postal code must contain 5 digits"))]
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct MigrationDetails {
    pub client_created: bool,
    pub responses_migrated: bool,
    pub eligibility_migrated: bool,
    pub session_migrated: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MigrationResult {
    pub client_id: Uuid,
    pub migrated_products: Vec<String>,
    pub token: String,
    pub refresh_token: String,
    pub details: MigrationDetails,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(completed: bool, migrated: bool, expires_in_hours: i64) -> TemporarySession {
        TemporarySession {
            id: Uuid::new_v4(),
            session_token: "f3b2".into(),
            ip_address: None,
            user_agent: None,
            completed,
            abandoned: false,
            migrated_to_account: migrated,
            migrated_at: None,
            client_id: None,
            expires_at: Utc::now() + Duration::hours(expires_in_hours),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_can_migrate_rules() {
        assert_eq!(session(true, false, 1).can_migrate(), Ok(()));
        assert_eq!(
            session(false, false, 1).can_migrate(),
            Err(MigrationBlocker::NotCompleted)
        );
        assert_eq!(
            session(true, true, 1).can_migrate(),
            Err(MigrationBlocker::AlreadyMigrated)
        );
        assert_eq!(
            session(true, false, -1).can_migrate(),
            Err(MigrationBlocker::Expired)
        );
    }

    #[test]
    fn test_open_session() {
        assert!(session(false, false, 1).is_open());
        assert!(!session(false, false, -1).is_open());
        let mut abandoned = session(false, false, 1);
        abandoned.abandoned = true;
        assert!(!abandoned.is_open());
    }

    #[test]
    fn test_rate_rounds_to_two_decimals() {
        assert_eq!(rate(1, 3), 33.33);
        assert_eq!(rate(2, 3), 66.67);
        assert_eq!(rate(5, 0), 0.0);
        assert_eq!(rate(4, 4), 100.0);
    }

    #[test]
    fn test_reference_accepts_token_alias() {
        let req: SessionReferenceRequest =
            serde_json::from_value(serde_json::json!({ "session_token": "abc" })).unwrap();
        assert_eq!(req.session_id, "abc");
    }

    #[test]
    fn test_new_session_token_and_expiry() {
        let new = NewTemporarySession::new(Some("127.0.0.1".into()), None, 24);
        assert_eq!(new.session_token.len(), 32);
        assert!(new.expires_at > Utc::now() + Duration::hours(23));
    }
}
