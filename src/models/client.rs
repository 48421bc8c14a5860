// Client accounts: companies looking for financial optimisation

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
use crate::models::dossier::DossierView;
use crate::models::status::{parse_or, ClientStatut};
use crate::schema::clients;
use crate::utils::validation::{
    validate_password_strength, PHONE_REGEX, POSTAL_CODE_REGEX, SIREN_REGEX,
};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, ToSchema)]
#[diesel(table_name = clients)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Client {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub username: String,
    pub company_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub siren: Option<String>,
    pub secteur_activite: Option<String>,
    pub nombre_employes: Option<i32>,
    pub revenu_annuel: Option<f64>,
    pub anciennete_entreprise: Option<i32>,
    pub statut: String,
    pub source: String,
    pub apporteur_id: Option<Uuid>,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub derniere_connexion: Option<DateTime<Utc>>,
    #[serde(skip_serializing, default)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = clients)]
pub struct NewClient {
    pub email: String,
    pub password_hash: Option<String>,
    pub username: String,
    pub company_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub siren: Option<String>,
    pub secteur_activite: Option<String>,
    pub nombre_employes: Option<i32>,
    pub revenu_annuel: Option<f64>,
    pub anciennete_entreprise: Option<i32>,
    pub statut: String,
    pub source: String,
    pub apporteur_id: Option<Uuid>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = clients)]
pub struct ClientUpdate {
    pub email: Option<String>,
    pub password_hash: Option<Option<String>>,
    pub username: Option<String>,
    pub company_name: Option<Option<String>>,
    pub phone_number: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub city: Option<Option<String>>,
    pub postal_code: Option<Option<String>>,
    pub siren: Option<Option<String>>,
    pub secteur_activite: Option<Option<String>>,
    pub nombre_employes: Option<Option<i32>>,
    pub revenu_annuel: Option<Option<f64>>,
    pub anciennete_entreprise: Option<Option<i32>>,
    pub statut: Option<String>,
    pub apporteur_id: Option<Option<Uuid>>,
    pub metadata: Option<serde_json::Value>,
    pub derniere_connexion: Option<Option<DateTime<Utc>>>,
    pub deleted_at: Option<Option<DateTime<Utc>>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields a client (or an apporteur for their prospect) may edit
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateClientProfileRequest {
    #[validate(length(min = 1, max = 255, message = "Username must be 1-255 characters"))]
    pub username: Option<String>,
    #[validate(length(max = 255, message = "Company name must be less than 255 characters"))]
    pub company_name: Option<String>,
    #[validate(regex(path = "PHONE_REGEX", message = "Invalid phone number"))]
    pub phone_number: Option<String>,
    #[validate(length(max = 500, message = "Address must be less than 500 characters"))]
    pub address: Option<String>,
    #[validate(length(max = 255, message = "City must be less than 255 characters"))]
    pub city: Option<String>,
    #[validate(regex(path = "POSTAL_CODE_REGEX", message = "Postal code must contain 5 digits"))]
    pub postal_code: Option<String>,
    #[validate(regex(path = "SIREN_REGEX", message = "SIREN must contain 9 digits"))]
    pub siren: Option<String>,
    pub secteur_activite: Option<String>,
    #[validate(range(min = 0, max = 1000000, message = "Invalid employee count"))]
    pub nombre_employes: Option<i32>,
    #[validate(range(min = 0.0, message = "Revenue cannot be negative"))]
    pub revenu_annuel: Option<f64>,
    #[validate(range(min = 0, max = 500, message = "Invalid company age"))]
    pub anciennete_entreprise: Option<i32>,
}

impl UpdateClientProfileRequest {
    pub fn into_changeset(self) -> ClientUpdate {
        ClientUpdate {
            username: self.username.map(|s| s.trim().to_string()),
            company_name: self.company_name.map(Some),
            phone_number: self.phone_number.map(Some),
            address: self.address.map(Some),
            city: self.city.map(Some),
            postal_code: self.postal_code.map(Some),
            siren: self.siren.map(Some),
            secteur_activite: self.secteur_activite.map(Some),
            nombre_employes: self.nombre_employes.map(Some),
            revenu_annuel: self.revenu_annuel.map(Some),
            anciennete_entreprise: self.anciennete_entreprise.map(Some),
            updated_at: Some(Utc::now()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateClientStatusRequest {
    pub statut: ClientStatut,
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct ClientFilter {
    pub statut: Option<String>,
    pub search: Option<String>,
    pub apporteur_id: Option<Uuid>,
}

/// Account created by an administrator
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateClientRequest {
    #[validate(length(min = 1, max = 255, message = "Username is required"))]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    /// A temporary password is generated when omitted
    #[validate(custom = "validate_password_strength")]
    pub password: Option<String>,
    #[validate(length(max = 255))]
    pub company_name: Option<String>,
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
    pub secteur_activite: Option<String>,
    #[validate(range(min = 0, max = 1000000, message = "Invalid employee count"))]
    pub nombre_employes: Option<i32>,
    pub statut: Option<ClientStatut>,
    pub apporteur_id: Option<Uuid>,
}

/// Client with their dossiers, for the admin detail view
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClientDetail {
    #[serde(flatten)]
    pub client: Client,
    pub dossiers: Vec<DossierView>,
}

/// Freshly created account; the temporary password is only ever shown here
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatedClient {
    pub client: Client,
    pub temporary_password: Option<String>,
}

impl Client {
    pub fn statut_enum(&self) -> ClientStatut {
        parse_or(&self.statut, ClientStatut::Inactif)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Find a client that has not been soft-deleted
    pub async fn find_by_id(conn: &mut AsyncPgConnection, client_id: Uuid) -> QueryResult<Self> {
        clients::table
            .filter(clients::id.eq(client_id))
            .filter(clients::deleted_at.is_null())
            .select(Client::as_select())
            .first(conn)
            .await
    }

    /// Case-insensitive email lookup among live accounts
    pub async fn find_by_email(conn: &mut AsyncPgConnection, email: &str) -> QueryResult<Self> {
        clients::table
            .filter(lower(clients::email).eq(normalize_email(email)))
            .filter(clients::deleted_at.is_null())
            .select(Client::as_select())
            .first(conn)
            .await
    }

    pub async fn email_exists(conn: &mut AsyncPgConnection, email: &str) -> QueryResult<bool> {
        let count: i64 = clients::table
            .filter(lower(clients::email).eq(normalize_email(email)))
            .filter(clients::deleted_at.is_null())
            .count()
            .get_result(conn)
            .await?;
        Ok(count > 0)
    }

    pub async fn siren_exists(conn: &mut AsyncPgConnection, siren: &str) -> QueryResult<bool> {
        let count: i64 = clients::table
            .filter(clients::siren.eq(siren))
            .filter(clients::deleted_at.is_null())
            .count()
            .get_result(conn)
            .await?;
        Ok(count > 0)
    }

    pub async fn create(conn: &mut AsyncPgConnection, new_client: NewClient) -> QueryResult<Self> {
        diesel::insert_into(clients::table)
            .values(&new_client)
            .returning(Client::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn update(
        conn: &mut AsyncPgConnection,
        client_id: Uuid,
        update: ClientUpdate,
    ) -> QueryResult<Self> {
        diesel::update(
            clients::table
                .filter(clients::id.eq(client_id))
                .filter(clients::deleted_at.is_null()),
        )
        .set(&update)
        .returning(Client::as_returning())
        .get_result(conn)
        .await
    }

    pub async fn soft_delete(conn: &mut AsyncPgConnection, client_id: Uuid) -> QueryResult<Self> {
        let now = Utc::now();
        Self::update(
            conn,
            client_id,
            ClientUpdate {
                statut: Some(ClientStatut::Inactif.as_str().to_string()),
                deleted_at: Some(Some(now)),
                updated_at: Some(now),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn record_login(conn: &mut AsyncPgConnection, client_id: Uuid) -> QueryResult<usize> {
        diesel::update(clients::table.filter(clients::id.eq(client_id)))
            .set(clients::derniere_connexion.eq(Some(Utc::now())))
            .execute(conn)
            .await
    }

    pub async fn list(
        conn: &mut AsyncPgConnection,
        filter: &ClientFilter,
        page: &PaginationQuery,
    ) -> QueryResult<(Vec<Self>, i64)> {
        let build = || {
            let mut query = clients::table
                .filter(clients::deleted_at.is_null())
                .into_boxed();
            if let Some(statut) = &filter.statut {
                query = query.filter(clients::statut.eq(statut.clone()));
            }
            if let Some(apporteur) = filter.apporteur_id {
                query = query.filter(clients::apporteur_id.eq(apporteur));
            }
            if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
                let pattern = like_pattern(search);
                query = query.filter(
                    clients::username
                        .ilike(pattern.clone())
                        .or(clients::email.ilike(pattern.clone()))
                        .or(clients::company_name.ilike(pattern)),
                );
            }
            query
        };

        let total: i64 = build().count().get_result(conn).await?;
        let items = build()
            .order(clients::created_at.desc())
            .limit(page.limit())
            .offset(page.offset())
            .select(Client::as_select())
            .load(conn)
            .await?;

        Ok((items, total))
    }

    /// Live clients grouped by statut, optionally restricted to one apporteur's portfolio
    pub async fn count_by_statut(
        conn: &mut AsyncPgConnection,
        apporteur_id: Option<Uuid>,
    ) -> QueryResult<Vec<(String, i64)>> {
        let live = clients::table.filter(clients::deleted_at.is_null());
        match apporteur_id {
            Some(apporteur_id) => {
                live.filter(clients::apporteur_id.eq(apporteur_id))
                    .group_by(clients::statut)
                    .select((clients::statut, count_star()))
                    .load(conn)
                    .await
            },
            None => {
                live.group_by(clients::statut)
                    .select((clients::statut, count_star()))
                    .load(conn)
                    .await
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_client() -> Client {
        Client {
            id: Uuid::new_v4(),
            email: "contact@transports-martin.fr".to_string(),
            password_hash: Some("$argon2id$secret".to_string()),
            username: "Martin".to_string(),
            company_name: Some("Transports Martin".to_string()),
            phone_number: None,
            address: None,
            city: Some("Lyon".to_string()),
            postal_code: None,
            siren: Some("123456789".to_string()),
            secteur_activite: Some("Transport routier de marchandises".to_string()),
            nombre_employes: Some(13),
            revenu_annuel: Some(1_040_000.0),
            anciennete_entreprise: Some(5),
            statut: "en_attente".to_string(),
            source: "simulator_migration".to_string(),
            apporteur_id: None,
            metadata: serde_json::json!({}),
            derniere_connexion: None,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let json = serde_json::to_value(sample_client()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("deleted_at").is_none());
        assert_eq!(json["statut"], "en_attente");
    }

    #[test]
    fn test_statut_enum_fallback() {
        let mut client = sample_client();
        assert_eq!(client.statut_enum(), ClientStatut::EnAttente);
        client.statut = "garbage".to_string();
        assert_eq!(client.statut_enum(), ClientStatut::Inactif);
    }

    #[test]
    fn test_profile_request_validation() {
        let req = UpdateClientProfileRequest {
            username: Some("Martin".into()),
            company_name: None,
            phone_number: Some("+33 6 12 34 56 78".into()),
            address: None,
            city: None,
            postal_code: Some("6900".into()),
            siren: Some("12345678".into()),
            secteur_activite: None,
            nombre_employes: Some(-1),
            revenu_annuel: None,
            anciennete_entreprise: None,
        };
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("postal_code"));
        assert!(fields.contains_key("siren"));
        assert!(fields.contains_key("nombre_employes"));
        assert!(!fields.contains_key("phone_number"));
    }

    #[test]
    fn test_profile_request_changeset_wraps_options() {
        let req = UpdateClientProfileRequest {
            username: Some("  Martin  ".into()),
            company_name: Some("TM".into()),
            phone_number: None,
            address: None,
            city: None,
            postal_code: None,
            siren: None,
            secteur_activite: None,
            nombre_employes: None,
            revenu_annuel: None,
            anciennete_entreprise: None,
        };
        let changeset = req.into_changeset();
        assert_eq!(changeset.username.as_deref(), Some("Martin"));
        assert_eq!(changeset.company_name, Some(Some("TM".to_string())));
        assert!(changeset.phone_number.is_none());
        assert!(changeset.updated_at.is_some());
    }
}
