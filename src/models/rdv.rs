// Rendez-vous between clients, experts and apporteurs

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::auth::UserType;
use crate::models::produit::ProduitEligible;
use crate::models::status::{parse_or, MeetingType, RdvCategory, RdvStatus};
use crate::schema::{produits_eligibles, rdv_produits, rdvs};

pub const DEFAULT_DURATION_MINUTES: i32 = 30;
pub const DEFAULT_PRIORITY: i32 = 2;
pub const DEFAULT_TIMEZONE: &str = "Europe/Paris";

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, ToSchema)]
#[diesel(table_name = rdvs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Rdv {
    pub id: Uuid,
    pub client_id: Option<Uuid>,
    pub expert_id: Option<Uuid>,
    pub apporteur_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_by_type: String,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_date: NaiveDate,
    #[schema(value_type = String, example = "14:30:00")]
    pub scheduled_time: NaiveTime,
    pub duration_minutes: i32,
    pub meeting_type: String,
    pub location: Option<String>,
    pub meeting_url: Option<String>,
    pub status: String,
    pub category: String,
    pub priority: i32,
    pub timezone: String,
    pub original_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub original_time: Option<NaiveTime>,
    pub alternative_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub alternative_time: Option<NaiveTime>,
    pub expert_notes: Option<String>,
    pub refusal_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub last_response: Option<String>,
    pub last_response_by: Option<Uuid>,
    pub last_response_at: Option<DateTime<Utc>>,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = rdvs)]
pub struct NewRdv {
    pub client_id: Option<Uuid>,
    pub expert_id: Option<Uuid>,
    pub apporteur_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_by_type: String,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub duration_minutes: i32,
    pub meeting_type: String,
    pub location: Option<String>,
    pub meeting_url: Option<String>,
    pub status: String,
    pub category: String,
    pub priority: i32,
    pub timezone: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = rdvs)]
pub struct RdvUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<NaiveTime>,
    pub duration_minutes: Option<i32>,
    pub meeting_type: Option<String>,
    pub location: Option<Option<String>>,
    pub meeting_url: Option<Option<String>>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub priority: Option<i32>,
    pub original_date: Option<Option<NaiveDate>>,
    pub original_time: Option<Option<NaiveTime>>,
    pub alternative_date: Option<Option<NaiveDate>>,
    pub alternative_time: Option<Option<NaiveTime>>,
    pub expert_notes: Option<Option<String>>,
    pub refusal_reason: Option<Option<String>>,
    pub cancellation_reason: Option<Option<String>>,
    pub last_response: Option<Option<String>>,
    pub last_response_by: Option<Option<Uuid>>,
    pub last_response_at: Option<Option<DateTime<Utc>>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, ToSchema)]
#[diesel(table_name = rdv_produits)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RdvProduit {
    pub id: Uuid,
    pub rdv_id: Uuid,
    pub produit_id: Uuid,
    pub client_produit_eligible_id: Option<Uuid>,
    pub priority: i32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = rdv_produits)]
pub struct NewRdvProduit {
    pub rdv_id: Uuid,
    pub produit_id: Uuid,
    pub client_produit_eligible_id: Option<Uuid>,
    pub priority: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RdvProduitView {
    #[serde(flatten)]
    pub link: RdvProduit,
    pub produit: ProduitEligible,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RdvDetail {
    #[serde(flatten)]
    pub rdv: Rdv,
    pub produits: Vec<RdvProduitView>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RdvProduitInput {
    pub produit_id: Uuid,
    pub client_produit_eligible_id: Option<Uuid>,
    pub priority: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateRdvRequest {
    pub client_id: Option<Uuid>,
    pub expert_id: Option<Uuid>,
    pub apporteur_id: Option<Uuid>,
    #[validate(length(max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub scheduled_date: NaiveDate,
    #[schema(value_type = String, example = "14:30")]
    #[serde(deserialize_with = "deserialize_time")]
    pub scheduled_time: NaiveTime,
    #[validate(range(min = 15, max = 480, message = "Duration must be 15-480 minutes"))]
    pub duration_minutes: Option<i32>,
    #[serde(default = "default_meeting_type")]
    pub meeting_type: MeetingType,
    pub location: Option<String>,
    #[validate(url(message = "Invalid meeting URL"))]
    pub meeting_url: Option<String>,
    pub status: Option<RdvStatus>,
    pub category: Option<RdvCategory>,
    #[validate(range(min = 1, max = 4, message = "Priority must be 1-4"))]
    pub priority: Option<i32>,
    pub timezone: Option<String>,
    #[serde(default)]
    pub produits: Vec<RdvProduitInput>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

fn default_meeting_type() -> MeetingType {
    MeetingType::Video
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateRdvRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, example = "09:00")]
    #[serde(default, deserialize_with = "deserialize_optional_time")]
    pub scheduled_time: Option<NaiveTime>,
    #[validate(range(min = 15, max = 480, message = "Duration must be 15-480 minutes"))]
    pub duration_minutes: Option<i32>,
    pub meeting_type: Option<MeetingType>,
    pub location: Option<String>,
    #[validate(url(message = "Invalid meeting URL"))]
    pub meeting_url: Option<String>,
    pub category: Option<RdvCategory>,
    #[validate(range(min = 1, max = 4, message = "Priority must be 1-4"))]
    pub priority: Option<i32>,
}

impl UpdateRdvRequest {
    pub fn into_changeset(self) -> RdvUpdate {
        RdvUpdate {
            title: self.title,
            description: self.description.map(Some),
            scheduled_date: self.scheduled_date,
            scheduled_time: self.scheduled_time,
            duration_minutes: self.duration_minutes,
            meeting_type: self.meeting_type.map(|m| m.as_str().to_string()),
            location: self.location.map(Some),
            meeting_url: self.meeting_url.map(Some),
            category: self.category.map(|c| c.as_str().to_string()),
            priority: self.priority,
            updated_at: Some(Utc::now()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RdvAction {
    Accept,
    Refuse,
    ProposeAlternative,
}

impl RdvAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RdvAction::Accept => "accept",
            RdvAction::Refuse => "refuse",
            RdvAction::ProposeAlternative => "propose_alternative",
        }
    }
}

/// Expert validation of a proposed RDV, or a participant's response
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RdvResponseRequest {
    pub action: RdvAction,
    pub alternative_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, example = "10:30")]
    #[serde(default, deserialize_with = "deserialize_optional_time")]
    pub alternative_time: Option<NaiveTime>,
    #[validate(length(max = 2000))]
    pub reason: Option<String>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct MarkCompletedRequest {
    pub completed: bool,
    #[validate(length(max = 2000))]
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct RdvFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub category: Option<String>,
    /// `calendar` returns CalendarEvent objects
    pub format: Option<String>,
}

impl RdvFilter {
    pub fn wants_calendar(&self) -> bool {
        self.format.as_deref() == Some("calendar")
    }
}

/// Calendar rendering of an RDV
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub status: String,
    pub color: &'static str,
    pub meeting_type: String,
    pub category: String,
    pub priority: &'static str,
    pub location: Option<String>,
    pub meeting_url: Option<String>,
    pub client_id: Option<Uuid>,
    pub expert_id: Option<Uuid>,
    pub apporteur_id: Option<Uuid>,
}

pub fn priority_label(priority: i32) -> &'static str {
    match priority {
        1 => "low",
        2 => "medium",
        3 => "high",
        _ => "critical",
    }
}

/// Slots start on the hour or the half hour
pub fn is_valid_slot(time: NaiveTime) -> bool {
    (time.minute() == 0 || time.minute() == 30) && time.second() == 0
}

/// Accepts `HH:MM` and `HH:MM:SS`
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

fn deserialize_time<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_time(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid time '{raw}'")))
}

fn deserialize_optional_time<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_time(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid time '{raw}'"))),
        None => Ok(None),
    }
}

/// Which RDVs a caller may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdvScope {
    Participant(UserType, Uuid),
    All,
}

impl Rdv {
    pub fn status_enum(&self) -> RdvStatus {
        parse_or(&self.status, RdvStatus::Proposed)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.scheduled_date.and_time(self.scheduled_time)
    }

    pub fn end(&self) -> NaiveDateTime {
        self.start() + Duration::minutes(i64::from(self.duration_minutes))
    }

    pub fn is_participant(&self, user_type: UserType, user_id: Uuid) -> bool {
        match user_type {
            UserType::Client => self.client_id == Some(user_id),
            UserType::Expert => self.expert_id == Some(user_id),
            UserType::Apporteur => self.apporteur_id == Some(user_id),
            UserType::Admin => false,
        }
    }

    /// Participants other than `actor`, as (type, id)
    pub fn other_participants(&self, actor: Uuid) -> Vec<(UserType, Uuid)> {
        [
            (UserType::Client, self.client_id),
            (UserType::Expert, self.expert_id),
            (UserType::Apporteur, self.apporteur_id),
        ]
        .into_iter()
        .filter_map(|(user_type, id)| id.map(|id| (user_type, id)))
        .filter(|(_, id)| *id != actor)
        .collect()
    }

    pub fn to_calendar_event(&self) -> CalendarEvent {
        let status = self.status_enum();
        CalendarEvent {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            start: self.start(),
            end: self.end(),
            status: self.status.clone(),
            color: status.color(),
            meeting_type: self.meeting_type.clone(),
            category: self.category.clone(),
            priority: priority_label(self.priority),
            location: self.location.clone(),
            meeting_url: self.meeting_url.clone(),
            client_id: self.client_id,
            expert_id: self.expert_id,
            apporteur_id: self.apporteur_id,
        }
    }

    pub async fn find_by_id(conn: &mut AsyncPgConnection, rdv_id: Uuid) -> QueryResult<Self> {
        rdvs::table
            .filter(rdvs::id.eq(rdv_id))
            .select(Rdv::as_select())
            .first(conn)
            .await
    }

    pub async fn create(conn: &mut AsyncPgConnection, new_rdv: NewRdv) -> QueryResult<Self> {
        diesel::insert_into(rdvs::table)
            .values(&new_rdv)
            .returning(Rdv::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn update(
        conn: &mut AsyncPgConnection,
        rdv_id: Uuid,
        update: RdvUpdate,
    ) -> QueryResult<Self> {
        diesel::update(rdvs::table.filter(rdvs::id.eq(rdv_id)))
            .set(&update)
            .returning(Rdv::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn delete(conn: &mut AsyncPgConnection, rdv_id: Uuid) -> QueryResult<usize> {
        diesel::delete(rdvs::table.filter(rdvs::id.eq(rdv_id)))
            .execute(conn)
            .await
    }

    pub async fn list_scoped(
        conn: &mut AsyncPgConnection,
        scope: RdvScope,
        filter: &RdvFilter,
    ) -> QueryResult<Vec<Self>> {
        let mut query = rdvs::table.into_boxed();
        if let RdvScope::Participant(user_type, user_id) = scope {
            query = match user_type {
                UserType::Client => query.filter(rdvs::client_id.eq(user_id)),
                UserType::Expert => query.filter(rdvs::expert_id.eq(user_id)),
                UserType::Apporteur => query.filter(rdvs::apporteur_id.eq(user_id)),
                UserType::Admin => query,
            };
        }
        if let Some(start) = filter.start_date {
            query = query.filter(rdvs::scheduled_date.ge(start));
        }
        if let Some(end) = filter.end_date {
            query = query.filter(rdvs::scheduled_date.le(end));
        }
        if let Some(status) = &filter.status {
            query = query.filter(rdvs::status.eq(status.clone()));
        }
        if let Some(category) = &filter.category {
            query = query.filter(rdvs::category.eq(category.clone()));
        }
        query
            .order((rdvs::scheduled_date.asc(), rdvs::scheduled_time.asc()))
            .select(Rdv::as_select())
            .load(conn)
            .await
    }

    pub async fn pending_for_expert(
        conn: &mut AsyncPgConnection,
        expert_id: Uuid,
    ) -> QueryResult<Vec<Self>> {
        rdvs::table
            .filter(rdvs::expert_id.eq(expert_id))
            .filter(rdvs::status.eq(RdvStatus::Proposed.as_str()))
            .order((rdvs::scheduled_date.asc(), rdvs::scheduled_time.asc()))
            .select(Rdv::as_select())
            .load(conn)
            .await
    }

    /// Open RDVs between today and `days` ahead
    pub async fn count_upcoming(conn: &mut AsyncPgConnection, days: i64) -> QueryResult<i64> {
        let today = Utc::now().date_naive();
        rdvs::table
            .filter(rdvs::scheduled_date.ge(today))
            .filter(rdvs::scheduled_date.le(today + Duration::days(days)))
            .filter(rdvs::status.eq_any(vec![
                RdvStatus::Proposed.as_str(),
                RdvStatus::Confirmed.as_str(),
                RdvStatus::Rescheduled.as_str(),
            ]))
            .count()
            .get_result(conn)
            .await
    }
}

impl RdvProduit {
    pub async fn create_many(
        conn: &mut AsyncPgConnection,
        links: &[NewRdvProduit],
    ) -> QueryResult<usize> {
        if links.is_empty() {
            return Ok(0);
        }
        diesel::insert_into(rdv_produits::table)
            .values(links)
            .execute(conn)
            .await
    }

    pub async fn list_for_rdv(
        conn: &mut AsyncPgConnection,
        rdv_id: Uuid,
    ) -> QueryResult<Vec<RdvProduitView>> {
        let rows = rdv_produits::table
            .inner_join(produits_eligibles::table)
            .filter(rdv_produits::rdv_id.eq(rdv_id))
            .order(rdv_produits::priority.asc())
            .select((RdvProduit::as_select(), ProduitEligible::as_select()))
            .load::<(RdvProduit, ProduitEligible)>(conn)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(link, produit)| RdvProduitView { link, produit })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rdv() -> Rdv {
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
            scheduled_date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            scheduled_time: NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
            duration_minutes: 45,
            meeting_type: "video".into(),
            location: None,
            meeting_url: None,
            status: "confirmed".into(),
            category: "client_rdv".into(),
            priority: 3,
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
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_slot_validation() {
        assert!(is_valid_slot(NaiveTime::from_hms_opt(9, 0, 0).unwrap()));
        assert!(is_valid_slot(NaiveTime::from_hms_opt(9, 30, 0).unwrap()));
        assert!(!is_valid_slot(NaiveTime::from_hms_opt(9, 15, 0).unwrap()));
        assert!(!is_valid_slot(NaiveTime::from_hms_opt(9, 30, 10).unwrap()));
    }

    #[test]
    fn test_parse_time_formats() {
        assert_eq!(parse_time("14:30"), NaiveTime::from_hms_opt(14, 30, 0));
        assert_eq!(parse_time("08:00:00"), NaiveTime::from_hms_opt(8, 0, 0));
        assert_eq!(parse_time("25:00"), None);
    }

    #[test]
    fn test_calendar_event_shape() {
        let event = sample_rdv().to_calendar_event();
        assert_eq!(event.end - event.start, Duration::minutes(45));
        assert_eq!(event.color, RdvStatus::Confirmed.color());
        assert_eq!(event.priority, "high");
    }

    #[test]
    fn test_other_participants_excludes_actor() {
        let rdv = sample_rdv();
        let others = rdv.other_participants(rdv.created_by);
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].0, UserType::Expert);
        assert!(rdv.is_participant(UserType::Client, rdv.created_by));
        assert!(!rdv.is_participant(UserType::Apporteur, rdv.created_by));
    }

    #[test]
    fn test_create_request_parses_short_time() {
        let req: CreateRdvRequest = serde_json::from_value(serde_json::json!({
            "expert_id": Uuid::new_v4(),
            "scheduled_date": "2025-03-14",
            "scheduled_time": "10:30"
        }))
        .unwrap();
        assert_eq!(req.scheduled_time, NaiveTime::from_hms_opt(10, 30, 0).unwrap());
        assert_eq!(req.meeting_type, MeetingType::Video);
        assert!(req.produits.is_empty());
    }
}
