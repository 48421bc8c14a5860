// Expert accounts: accountants and tax specialists handling dossiers

use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::PgTextExpressionMethods;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::common::{like_pattern, lower, normalize_email, PaginationQuery};
use crate::models::status::{parse_or, ApprovalStatus, ExpertStatus};
use crate::schema::experts;
use crate::utils::validation::{validate_password_strength, PHONE_REGEX, SIREN_REGEX};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, ToSchema)]
#[diesel(table_name = experts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Expert {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub name: String,
    pub company_name: Option<String>,
    pub phone_number: Option<String>,
    pub siren: Option<String>,
    pub specializations: Vec<String>,
    pub experience: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub rating: f64,
    pub compensation: Option<f64>,
    pub status: String,
    pub approval_status: String,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub rejection_reason: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    #[serde(skip_serializing, default)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Marketplace view: no contact or moderation fields
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExpertPublic {
    pub id: Uuid,
    pub name: String,
    pub company_name: Option<String>,
    pub specializations: Vec<String>,
    pub experience: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub rating: f64,
}

impl From<Expert> for ExpertPublic {
    fn from(expert: Expert) -> Self {
        Self {
            id: expert.id,
            name: expert.name,
            company_name: expert.company_name,
            specializations: expert.specializations,
            experience: expert.experience,
            location: expert.location,
            description: expert.description,
            rating: expert.rating,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = experts)]
pub struct NewExpert {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub company_name: Option<String>,
    pub phone_number: Option<String>,
    pub siren: Option<String>,
    pub specializations: Vec<String>,
    pub experience: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub compensation: Option<f64>,
    pub status: String,
    pub approval_status: String,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = experts)]
pub struct ExpertUpdate {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub company_name: Option<Option<String>>,
    pub phone_number: Option<Option<String>>,
    pub siren: Option<Option<String>>,
    pub specializations: Option<Vec<String>>,
    pub experience: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub rating: Option<f64>,
    pub compensation: Option<Option<f64>>,
    pub status: Option<String>,
    pub approval_status: Option<String>,
    pub approved_at: Option<Option<DateTime<Utc>>>,
    pub approved_by: Option<Option<Uuid>>,
    pub rejection_reason: Option<Option<String>>,
    pub last_login: Option<Option<DateTime<Utc>>>,
    pub deleted_at: Option<Option<DateTime<Utc>>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Admin creation of an expert account
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateExpertRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(custom = "validate_password_strength")]
    pub password: String,
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
    pub company_name: Option<String>,
    #[validate(regex(path = "PHONE_REGEX", message = "Invalid phone number"))]
    pub phone_number: Option<String>,
    #[validate(regex(path = "SIREN_REGEX", message = "SIREN must contain 9 digits"))]
    pub siren: Option<String>,
    #[serde(default)]
    pub specializations: Vec<String>,
    pub experience: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0.0, max = 100.0, message = "Compensation must be a percentage"))]
    pub compensation: Option<f64>,
    /// Admin-created experts are approved immediately unless stated otherwise
    #[serde(default = "default_true")]
    pub auto_approve: bool,
}

fn default_true() -> bool {
    true
}

/// Fields editable by the expert or by an admin
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateExpertRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub company_name: Option<String>,
    #[validate(regex(path = "PHONE_REGEX", message = "Invalid phone number"))]
    pub phone_number: Option<String>,
    #[validate(regex(path = "SIREN_REGEX", message = "SIREN must contain 9 digits"))]
    pub siren: Option<String>,
    pub specializations: Option<Vec<String>>,
    pub experience: Option<String>,
    pub location: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 0.0, max = 100.0, message = "Compensation must be a percentage"))]
    pub compensation: Option<f64>,
    #[validate(range(min = 0.0, max = 5.0, message = "Rating must be between 0 and 5"))]
    pub rating: Option<f64>,
}

impl UpdateExpertRequest {
    /// `privileged` is true for admins; experts cannot set their own rating or compensation
    pub fn into_changeset(self, privileged: bool) -> ExpertUpdate {
        ExpertUpdate {
            name: self.name.map(|n| n.trim().to_string()),
            company_name: self.company_name.map(Some),
            phone_number: self.phone_number.map(Some),
            siren: self.siren.map(Some),
            specializations: self.specializations,
            experience: self.experience.map(Some),
            location: self.location.map(Some),
            description: self.description.map(Some),
            compensation: if privileged {
                self.compensation.map(Some)
            } else {
                None
            },
            rating: if privileged { self.rating } else { None },
            updated_at: Some(Utc::now()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RejectExpertRequest {
    #[validate(length(min = 1, max = 2000, message = "A rejection reason is required"))]
    pub reason: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct ExpertFilter {
    pub approval_status: Option<String>,
    pub status: Option<String>,
    pub specialization: Option<String>,
    pub location: Option<String>,
    pub search: Option<String>,
}

impl Expert {
    pub fn status_enum(&self) -> ExpertStatus {
        parse_or(&self.status, ExpertStatus::Inactive)
    }

    pub fn approval_enum(&self) -> ApprovalStatus {
        parse_or(&self.approval_status, ApprovalStatus::Pending)
    }

    /// Visible in the marketplace and allowed to log in
    pub fn is_available(&self) -> bool {
        self.approval_enum() == ApprovalStatus::Approved
            && self.status_enum() == ExpertStatus::Active
            && self.deleted_at.is_none()
    }

    pub async fn find_by_id(conn: &mut AsyncPgConnection, expert_id: Uuid) -> QueryResult<Self> {
        experts::table
            .filter(experts::id.eq(expert_id))
            .filter(experts::deleted_at.is_null())
            .select(Expert::as_select())
            .first(conn)
            .await
    }

    pub async fn find_by_email(conn: &mut AsyncPgConnection, email: &str) -> QueryResult<Self> {
        experts::table
            .filter(lower(experts::email).eq(normalize_email(email)))
            .filter(experts::deleted_at.is_null())
            .select(Expert::as_select())
            .first(conn)
            .await
    }

    pub async fn create(conn: &mut AsyncPgConnection, new_expert: NewExpert) -> QueryResult<Self> {
        diesel::insert_into(experts::table)
            .values(&new_expert)
            .returning(Expert::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn update(
        conn: &mut AsyncPgConnection,
        expert_id: Uuid,
        update: ExpertUpdate,
    ) -> QueryResult<Self> {
        diesel::update(
            experts::table
                .filter(experts::id.eq(expert_id))
                .filter(experts::deleted_at.is_null()),
        )
        .set(&update)
        .returning(Expert::as_returning())
        .get_result(conn)
        .await
    }

    pub async fn record_login(conn: &mut AsyncPgConnection, expert_id: Uuid) -> QueryResult<usize> {
        diesel::update(experts::table.filter(experts::id.eq(expert_id)))
            .set(experts::last_login.eq(Some(Utc::now())))
            .execute(conn)
            .await
    }

    /// `marketplace_only` restricts to approved, active experts
    pub async fn list(
        conn: &mut AsyncPgConnection,
        filter: &ExpertFilter,
        page: &PaginationQuery,
        marketplace_only: bool,
    ) -> QueryResult<(Vec<Self>, i64)> {
        let build = || {
            let mut query = experts::table
                .filter(experts::deleted_at.is_null())
                .into_boxed();
            if marketplace_only {
                query = query
                    .filter(experts::approval_status.eq(ApprovalStatus::Approved.as_str()))
                    .filter(experts::status.eq(ExpertStatus::Active.as_str()));
            } else {
                if let Some(approval) = &filter.approval_status {
                    query = query.filter(experts::approval_status.eq(approval.clone()));
                }
                if let Some(status) = &filter.status {
                    query = query.filter(experts::status.eq(status.clone()));
                }
            }
            if let Some(spec) = &filter.specialization {
                query = query.filter(experts::specializations.contains(vec![spec.clone()]));
            }
            if let Some(location) = filter.location.as_deref().filter(|l| !l.trim().is_empty()) {
                query = query.filter(experts::location.ilike(like_pattern(location)));
            }
            if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
                let pattern = like_pattern(search);
                query = query.filter(
                    experts::name
                        .ilike(pattern.clone())
                        .or(experts::email.ilike(pattern.clone()))
                        .or(experts::company_name.ilike(pattern)),
                );
            }
            query
        };

        let total: i64 = build().count().get_result(conn).await?;
        let items = build()
            .order((experts::rating.desc(), experts::created_at.desc()))
            .limit(page.limit())
            .offset(page.offset())
            .select(Expert::as_select())
            .load(conn)
            .await?;

        Ok((items, total))
    }

    pub async fn count_by_approval(
        conn: &mut AsyncPgConnection,
    ) -> QueryResult<Vec<(String, i64)>> {
        experts::table
            .filter(experts::deleted_at.is_null())
            .group_by(experts::approval_status)
            .select((experts::approval_status, count_star()))
            .load(conn)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_expert(approval: &str, status: &str) -> Expert {
        Expert {
            id: Uuid::new_v4(),
            email: "expert@cabinet-fiscal.fr".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            name: "Claire Dubois".to_string(),
            company_name: Some("Cabinet Dubois".to_string()),
            phone_number: Some("0102030405".to_string()),
            siren: None,
            specializations: vec!["TICPE".to_string(), "URSSAF".to_string()],
            experience: Some("10 ans".to_string()),
            location: Some("Paris".to_string()),
            description: None,
            rating: 4.5,
            compensation: Some(15.0),
            status: status.to_string(),
            approval_status: approval.to_string(),
            approved_at: None,
            approved_by: None,
            rejection_reason: None,
            last_login: None,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_availability_requires_approval_and_active() {
        assert!(sample_expert("approved", "active").is_available());
        assert!(!sample_expert("pending", "active").is_available());
        assert!(!sample_expert("approved", "suspended").is_available());
        assert!(!sample_expert("rejected", "active").is_available());
    }

    #[test]
    fn test_public_view_hides_contact_fields() {
        let public = ExpertPublic::from(sample_expert("approved", "active"));
        let json = serde_json::to_value(public).unwrap();
        assert!(json.get("email").is_none());
        assert!(json.get("phone_number").is_none());
        assert_eq!(json["specializations"][0], "TICPE");
    }

    #[test]
    fn test_expert_cannot_set_own_rating() {
        let req = UpdateExpertRequest {
            name: None,
            company_name: None,
            phone_number: None,
            siren: None,
            specializations: None,
            experience: None,
            location: Some("Lyon".into()),
            description: None,
            compensation: Some(30.0),
            rating: Some(5.0),
        };
        let changeset = req.clone().into_changeset(false);
        assert!(changeset.rating.is_none());
        assert!(changeset.compensation.is_none());
        assert_eq!(changeset.location, Some(Some("Lyon".to_string())));

        let changeset = req.into_changeset(true);
        assert_eq!(changeset.rating, Some(5.0));
    }

    #[test]
    fn test_reject_requires_reason() {
        let req = RejectExpertRequest {
            reason: String::new(),
        };
        assert!(req.validate().is_err());
    }
}
