// Apporteurs d'affaires: referral partners bringing prospects to the platform

use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::common::{like_pattern, lower, normalize_email, PaginationQuery, StatusCounts};
use crate::models::status::{parse_or, ApporteurStatus};
use crate::schema::apporteurs;
use crate::utils::validation::{
    validate_password_strength, PHONE_REGEX, POSTAL_CODE_REGEX, SIREN_REGEX,
};

pub const DEFAULT_COMMISSION_RATE: f64 = 0.10;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, ToSchema)]
#[diesel(table_name = apporteurs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Apporteur {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub company_name: Option<String>,
    pub phone_number: Option<String>,
    pub siren: Option<String>,
    pub commission_rate: f64,
    pub status: String,
    pub last_login: Option<DateTime<Utc>>,
    #[serde(skip_serializing, default)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = apporteurs)]
pub struct NewApporteur {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub company_name: Option<String>,
    pub phone_number: Option<String>,
    pub siren: Option<String>,
    pub commission_rate: f64,
    pub status: String,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = apporteurs)]
pub struct ApporteurUpdate {
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company_name: Option<Option<String>>,
    pub phone_number: Option<Option<String>>,
    pub siren: Option<Option<String>>,
    pub commission_rate: Option<f64>,
    pub status: Option<String>,
    pub deleted_at: Option<Option<DateTime<Utc>>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateApporteurRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(custom = "validate_password_strength")]
    pub password: String,
    #[validate(length(min = 1, max = 255, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 255, message = "Last name is required"))]
    pub last_name: String,
    pub company_name: Option<String>,
    #[validate(regex(path = "PHONE_REGEX", message = "Invalid phone number"))]
    pub phone_number: Option<String>,
    #[validate(regex(path = "SIREN_REGEX", message = "SIREN must contain 9 digits"))]
    pub siren: Option<String>,
    #[validate(range(min = 0.0, max = 1.0, message = "Commission rate must be between 0 and 1"))]
    pub commission_rate: Option<f64>,
    pub status: Option<ApporteurStatus>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateApporteurRequest {
    #[validate(length(min = 1, max = 255))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub last_name: Option<String>,
    pub company_name: Option<String>,
    #[validate(regex(path = "PHONE_REGEX", message = "Invalid phone number"))]
    pub phone_number: Option<String>,
    #[validate(regex(path = "SIREN_REGEX", message = "SIREN must contain 9 digits"))]
    pub siren: Option<String>,
    #[validate(range(min = 0.0, max = 1.0, message = "Commission rate must be between 0 and 1"))]
    pub commission_rate: Option<f64>,
}

impl UpdateApporteurRequest {
    /// Apporteurs cannot change their own commission rate
    pub fn into_changeset(self, privileged: bool) -> ApporteurUpdate {
        ApporteurUpdate {
            first_name: self.first_name.map(|s| s.trim().to_string()),
            last_name: self.last_name.map(|s| s.trim().to_string()),
            company_name: self.company_name.map(Some),
            phone_number: self.phone_number.map(Some),
            siren: self.siren.map(Some),
            commission_rate: self.commission_rate.filter(|_| privileged),
            updated_at: Some(Utc::now()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateApporteurStatusRequest {
    pub status: ApporteurStatus,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct ApporteurFilter {
    pub status: Option<String>,
    pub search: Option<String>,
}

/// A company brought in by an apporteur; stored as a client with `statut = prospect`
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateProspectRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, max = 255, message = "Contact name is required"))]
    pub username: String,
    #[validate(length(min = 1, max = 255, message = "Company name is required"))]
    pub company_name: String,
    #[validate(regex(path = "PHONE_REGEX", message = "Invalid phone number"))]
    pub phone_number: Option<String>,
    #[validate(regex(path = "SIREN_REGEX", message = "SIREN must contain 9 digits"))]
    pub siren: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    #[validate(regex(path = "POSTAL_CODE_REGEX", message = "Postal code must contain 5 digits"))]
    pub postal_code: Option<String>,
    pub secteur_activite: Option<String>,
    #[validate(range(min = 0, max = 1000000, message = "Invalid employee count"))]
    pub nombre_employes: Option<i32>,
    #[validate(range(min = 0.0, message = "Revenue cannot be negative"))]
    pub revenu_annuel: Option<f64>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

/// Returned once when temporary credentials are issued to a prospect
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProspectCredentials {
    pub client_id: Uuid,
    pub email: String,
    pub temporary_password: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApporteurStats {
    pub prospects: StatusCounts,
    pub dossiers: StatusCounts,
    pub completed_amount: f64,
    pub commission_rate: f64,
    pub estimated_commission: f64,
}

/// Commission owed on completed dossiers, rounded to cents
pub fn estimate_commission(completed_amount: f64, commission_rate: f64) -> f64 {
    (completed_amount * commission_rate * 100.0).round() / 100.0
}

impl Apporteur {
    pub fn status_enum(&self) -> ApporteurStatus {
        parse_or(&self.status, ApporteurStatus::Inactive)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub async fn find_by_id(conn: &mut AsyncPgConnection, apporteur_id: Uuid) -> QueryResult<Self> {
        apporteurs::table
            .filter(apporteurs::id.eq(apporteur_id))
            .filter(apporteurs::deleted_at.is_null())
            .select(Apporteur::as_select())
            .first(conn)
            .await
    }

    pub async fn find_by_email(conn: &mut AsyncPgConnection, email: &str) -> QueryResult<Self> {
        apporteurs::table
            .filter(lower(apporteurs::email).eq(normalize_email(email)))
            .filter(apporteurs::deleted_at.is_null())
            .select(Apporteur::as_select())
            .first(conn)
            .await
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_apporteur: NewApporteur,
    ) -> QueryResult<Self> {
        diesel::insert_into(apporteurs::table)
            .values(&new_apporteur)
            .returning(Apporteur::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn update(
        conn: &mut AsyncPgConnection,
        apporteur_id: Uuid,
        update: ApporteurUpdate,
    ) -> QueryResult<Self> {
        diesel::update(
            apporteurs::table
                .filter(apporteurs::id.eq(apporteur_id))
                .filter(apporteurs::deleted_at.is_null()),
        )
        .set(&update)
        .returning(Apporteur::as_returning())
        .get_result(conn)
        .await
    }

    pub async fn record_login(
        conn: &mut AsyncPgConnection,
        apporteur_id: Uuid,
    ) -> QueryResult<usize> {
        diesel::update(apporteurs::table.filter(apporteurs::id.eq(apporteur_id)))
            .set(apporteurs::last_login.eq(Some(Utc::now())))
            .execute(conn)
            .await
    }

    pub async fn list(
        conn: &mut AsyncPgConnection,
        filter: &ApporteurFilter,
        page: &PaginationQuery,
    ) -> QueryResult<(Vec<Self>, i64)> {
        let build = || {
            let mut query = apporteurs::table
                .filter(apporteurs::deleted_at.is_null())
                .into_boxed();
            if let Some(status) = &filter.status {
                query = query.filter(apporteurs::status.eq(status.clone()));
            }
            if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
                let pattern = like_pattern(search);
                query = query.filter(
                    apporteurs::first_name
                        .ilike(pattern.clone())
                        .or(apporteurs::last_name.ilike(pattern.clone()))
                        .or(apporteurs::email.ilike(pattern.clone()))
                        .or(apporteurs::company_name.ilike(pattern)),
                );
            }
            query
        };

        let total: i64 = build().count().get_result(conn).await?;
        let items = build()
            .order(apporteurs::created_at.desc())
            .limit(page.limit())
            .offset(page.offset())
            .select(Apporteur::as_select())
            .load(conn)
            .await?;

        Ok((items, total))
    }

    pub async fn count_by_status(conn: &mut AsyncPgConnection) -> QueryResult<Vec<(String, i64)>> {
        apporteurs::table
            .filter(apporteurs::deleted_at.is_null())
            .group_by(apporteurs::status)
            .select((apporteurs::status, count_star()))
            .load(conn)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update_request() -> UpdateApporteurRequest {
        UpdateApporteurRequest {
            first_name: Some(" Paul ".into()),
            last_name: None,
            company_name: None,
            phone_number: None,
            siren: None,
            commission_rate: Some(0.25),
        }
    }

    #[test]
    fn test_commission_rounds_to_cents() {
        assert_eq!(estimate_commission(12_345.67, 0.1), 1234.57);
        assert_eq!(estimate_commission(0.0, 0.15), 0.0);
    }

    #[test]
    fn test_self_update_cannot_touch_commission() {
        let changeset = update_request().into_changeset(false);
        assert!(changeset.commission_rate.is_none());
        assert_eq!(changeset.first_name.as_deref(), Some("Paul"));

        let changeset = update_request().into_changeset(true);
        assert_eq!(changeset.commission_rate, Some(0.25));
    }

    #[test]
    fn test_commission_rate_bounds() {
        let mut req = update_request();
        req.commission_rate = Some(1.5);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_prospect_requires_company() {
        let req = CreateProspectRequest {
            email: "dirigeant@boulangerie.fr".into(),
            username: "Jean".into(),
            company_name: String::new(),
            phone_number: None,
            siren: Some("552100554".into()),
            address: None,
            city: None,
            postal_code: None,
            secteur_activite: None,
            nombre_employes: Some(4),
            revenu_annuel: None,
            notes: None,
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("company_name"));
        assert!(!errors.field_errors().contains_key("siren"));
    }
}
