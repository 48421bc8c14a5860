// Dossiers: a client's eligibility and progress for one catalog product

use chrono::{DateTime, Utc};
use diesel::dsl::{count_star, sum};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::common::PaginationQuery;
use crate::models::produit::ProduitEligible;
use crate::models::status::{parse_or, DossierStatut};
use crate::schema::{client_produits_eligibles, clients, produits_eligibles};

pub const MAX_STEP: i32 = 5;

#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Associations, ToSchema,
)]
#[diesel(table_name = client_produits_eligibles)]
#[diesel(belongs_to(ProduitEligible, foreign_key = produit_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ClientProduitEligible {
    pub id: Uuid,
    pub client_id: Uuid,
    pub produit_id: Uuid,
    pub expert_id: Option<Uuid>,
    pub statut: String,
    pub taux_final: Option<f64>,
    pub montant_final: Option<f64>,
    pub duree_finale: Option<i32>,
    pub priorite: i32,
    pub current_step: i32,
    pub progress: i32,
    pub simulation_id: Option<Uuid>,
    pub notes: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub date_eligibilite: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = client_produits_eligibles)]
pub struct NewClientProduitEligible {
    pub client_id: Uuid,
    pub produit_id: Uuid,
    pub expert_id: Option<Uuid>,
    pub statut: String,
    pub taux_final: Option<f64>,
    pub montant_final: Option<f64>,
    pub duree_finale: Option<i32>,
    pub priorite: i32,
    pub simulation_id: Option<Uuid>,
    pub notes: Option<String>,
    pub metadata: serde_json::Value,
    pub date_eligibilite: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = client_produits_eligibles)]
pub struct DossierUpdate {
    pub expert_id: Option<Option<Uuid>>,
    pub statut: Option<String>,
    pub montant_final: Option<Option<f64>>,
    pub current_step: Option<i32>,
    pub progress: Option<i32>,
    pub notes: Option<Option<String>>,
    pub date_eligibilite: Option<Option<DateTime<Utc>>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DossierUpdate {
    pub fn status(statut: DossierStatut, notes: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            statut: Some(statut.as_str().to_string()),
            notes: notes.map(Some),
            date_eligibilite: (statut == DossierStatut::Eligible).then_some(Some(now)),
            updated_at: Some(now),
            ..Default::default()
        }
    }

    pub fn progress(current_step: i32, progress: i32, montant_final: Option<f64>) -> Self {
        Self {
            current_step: Some(current_step.clamp(0, MAX_STEP)),
            progress: Some(progress.clamp(0, 100)),
            montant_final: montant_final.map(Some),
            updated_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn assign_expert(expert_id: Uuid) -> Self {
        Self {
            expert_id: Some(Some(expert_id)),
            updated_at: Some(Utc::now()),
            ..Default::default()
        }
    }
}

/// Dossier with its product, as returned by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DossierView {
    #[serde(flatten)]
    pub dossier: ClientProduitEligible,
    pub produit: ProduitEligible,
}

impl From<(ClientProduitEligible, ProduitEligible)> for DossierView {
    fn from((dossier, produit): (ClientProduitEligible, ProduitEligible)) -> Self {
        Self { dossier, produit }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateDossierRequest {
    /// Required when an admin opens the dossier; ignored for clients
    pub client_id: Option<Uuid>,
    pub produit_id: Uuid,
    #[validate(range(min = 0.0, message = "Amount cannot be negative"))]
    pub montant_final: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0, message = "Rate must be between 0 and 1"))]
    pub taux_final: Option<f64>,
    #[validate(range(min = 1, max = 120, message = "Duration must be 1-120 months"))]
    pub duree_finale: Option<i32>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateDossierStatusRequest {
    pub statut: DossierStatut,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateDossierProgressRequest {
    #[validate(range(min = 0, max = 5, message = "Step must be between 0 and 5"))]
    pub current_step: i32,
    #[validate(range(min = 0, max = 100, message = "Progress must be between 0 and 100"))]
    pub progress: i32,
    #[validate(range(min = 0.0, message = "Amount cannot be negative"))]
    pub montant_final: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AssignExpertRequest {
    pub expert_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct DossierFilter {
    pub statut: Option<String>,
    pub produit_id: Option<Uuid>,
}

/// Which dossiers a caller may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DossierScope {
    Client(Uuid),
    Expert(Uuid),
    Apporteur(Uuid),
    All,
}

impl ClientProduitEligible {
    pub fn statut_enum(&self) -> DossierStatut {
        parse_or(&self.statut, DossierStatut::EnCours)
    }

    pub async fn find_by_id(conn: &mut AsyncPgConnection, dossier_id: Uuid) -> QueryResult<Self> {
        client_produits_eligibles::table
            .filter(client_produits_eligibles::id.eq(dossier_id))
            .select(ClientProduitEligible::as_select())
            .first(conn)
            .await
    }

    pub async fn find_view(
        conn: &mut AsyncPgConnection,
        dossier_id: Uuid,
    ) -> QueryResult<DossierView> {
        client_produits_eligibles::table
            .inner_join(produits_eligibles::table)
            .filter(client_produits_eligibles::id.eq(dossier_id))
            .select((ClientProduitEligible::as_select(), ProduitEligible::as_select()))
            .first::<(ClientProduitEligible, ProduitEligible)>(conn)
            .await
            .map(DossierView::from)
    }

    pub async fn exists_for(
        conn: &mut AsyncPgConnection,
        client_id: Uuid,
        produit_id: Uuid,
    ) -> QueryResult<bool> {
        let count: i64 = client_produits_eligibles::table
            .filter(client_produits_eligibles::client_id.eq(client_id))
            .filter(client_produits_eligibles::produit_id.eq(produit_id))
            .count()
            .get_result(conn)
            .await?;
        Ok(count > 0)
    }

    pub async fn produit_ids_for_client(
        conn: &mut AsyncPgConnection,
        client_id: Uuid,
    ) -> QueryResult<Vec<Uuid>> {
        client_produits_eligibles::table
            .filter(client_produits_eligibles::client_id.eq(client_id))
            .select(client_produits_eligibles::produit_id)
            .load(conn)
            .await
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_dossier: NewClientProduitEligible,
    ) -> QueryResult<Self> {
        diesel::insert_into(client_produits_eligibles::table)
            .values(&new_dossier)
            .returning(ClientProduitEligible::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn create_many(
        conn: &mut AsyncPgConnection,
        new_dossiers: &[NewClientProduitEligible],
    ) -> QueryResult<Vec<Self>> {
        if new_dossiers.is_empty() {
            return Ok(Vec::new());
        }
        diesel::insert_into(client_produits_eligibles::table)
            .values(new_dossiers)
            .returning(ClientProduitEligible::as_returning())
            .get_results(conn)
            .await
    }

    pub async fn update(
        conn: &mut AsyncPgConnection,
        dossier_id: Uuid,
        update: DossierUpdate,
    ) -> QueryResult<Self> {
        diesel::update(
            client_produits_eligibles::table.filter(client_produits_eligibles::id.eq(dossier_id)),
        )
        .set(&update)
        .returning(ClientProduitEligible::as_returning())
        .get_result(conn)
        .await
    }

    /// Applies a status change only if the row still has `expected` statut.
    /// `None` means another writer moved the dossier first.
    pub async fn update_if_statut(
        conn: &mut AsyncPgConnection,
        dossier_id: Uuid,
        expected: DossierStatut,
        update: DossierUpdate,
    ) -> QueryResult<Option<Self>> {
        diesel::update(
            client_produits_eligibles::table
                .filter(client_produits_eligibles::id.eq(dossier_id))
                .filter(client_produits_eligibles::statut.eq(expected.as_str())),
        )
        .set(&update)
        .returning(ClientProduitEligible::as_returning())
        .get_result(conn)
        .await
        .optional()
    }

    /// Dossiers visible to `scope`, newest first, with their product
    pub async fn list_scoped(
        conn: &mut AsyncPgConnection,
        scope: DossierScope,
        filter: &DossierFilter,
        page: &PaginationQuery,
    ) -> QueryResult<(Vec<DossierView>, i64)> {
        let build = || {
            let mut query = client_produits_eligibles::table
                .inner_join(produits_eligibles::table)
                .into_boxed();
            match scope {
                DossierScope::Client(client_id) => {
                    query = query.filter(client_produits_eligibles::client_id.eq(client_id));
                }
                DossierScope::Expert(expert_id) => {
                    query = query.filter(client_produits_eligibles::expert_id.eq(expert_id));
                }
                DossierScope::Apporteur(apporteur_id) => {
                    let client_ids = clients::table
                        .filter(clients::apporteur_id.eq(apporteur_id))
                        .select(clients::id);
                    query = query.filter(client_produits_eligibles::client_id.eq_any(client_ids));
                }
                DossierScope::All => {}
            }
            if let Some(statut) = &filter.statut {
                query = query.filter(client_produits_eligibles::statut.eq(statut.clone()));
            }
            if let Some(produit_id) = filter.produit_id {
                query = query.filter(client_produits_eligibles::produit_id.eq(produit_id));
            }
            query
        };

        let total: i64 = build().count().get_result(conn).await?;
        let rows = build()
            .order(client_produits_eligibles::created_at.desc())
            .limit(page.limit())
            .offset(page.offset())
            .select((ClientProduitEligible::as_select(), ProduitEligible::as_select()))
            .load::<(ClientProduitEligible, ProduitEligible)>(conn)
            .await?;

        Ok((rows.into_iter().map(DossierView::from).collect(), total))
    }

    pub async fn list_for_client(
        conn: &mut AsyncPgConnection,
        client_id: Uuid,
    ) -> QueryResult<Vec<DossierView>> {
        let rows = client_produits_eligibles::table
            .inner_join(produits_eligibles::table)
            .filter(client_produits_eligibles::client_id.eq(client_id))
            .order(client_produits_eligibles::priorite.asc())
            .select((ClientProduitEligible::as_select(), ProduitEligible::as_select()))
            .load::<(ClientProduitEligible, ProduitEligible)>(conn)
            .await?;
        Ok(rows.into_iter().map(DossierView::from).collect())
    }

    /// `None` counts the whole platform
    pub async fn count_by_statut(
        conn: &mut AsyncPgConnection,
        apporteur_id: Option<Uuid>,
    ) -> QueryResult<Vec<(String, i64)>> {
        match apporteur_id {
            Some(apporteur_id) => {
                let client_ids = clients::table
                    .filter(clients::apporteur_id.eq(apporteur_id))
                    .select(clients::id);
                client_produits_eligibles::table
                    .filter(client_produits_eligibles::client_id.eq_any(client_ids))
                    .group_by(client_produits_eligibles::statut)
                    .select((client_produits_eligibles::statut, count_star()))
                    .load(conn)
                    .await
            }
            None => {
                client_produits_eligibles::table
                    .group_by(client_produits_eligibles::statut)
                    .select((client_produits_eligibles::statut, count_star()))
                    .load(conn)
                    .await
            }
        }
    }

    /// Sum of `montant_final` over dossiers with the given statut
    pub async fn total_amount(
        conn: &mut AsyncPgConnection,
        statut: Option<DossierStatut>,
        apporteur_id: Option<Uuid>,
    ) -> QueryResult<f64> {
        let mut query = client_produits_eligibles::table
            .select(sum(client_produits_eligibles::montant_final))
            .into_boxed();
        if let Some(statut) = statut {
            query = query.filter(client_produits_eligibles::statut.eq(statut.as_str()));
        }
        if let Some(apporteur_id) = apporteur_id {
            let client_ids = clients::table
                .filter(clients::apporteur_id.eq(apporteur_id))
                .select(clients::id);
            query = query.filter(client_produits_eligibles::client_id.eq_any(client_ids));
        }
        let total: Option<f64> = query.first(conn).await?;
        Ok(total.unwrap_or(0.0))
    }
}

/// Score from which a calculator result opens an `eligible` dossier
pub const ELIGIBLE_DOSSIER_SCORE: i32 = 70;

/// Priority used when a dossier is opened from a calculator score
pub fn priority_for_score(score: i32) -> i32 {
    if score >= ELIGIBLE_DOSSIER_SCORE {
        1
    } else {
        2
    }
}

/// Initial statut for a dossier opened from a calculator score
pub fn statut_for_score(score: i32) -> DossierStatut {
    if score >= ELIGIBLE_DOSSIER_SCORE {
        DossierStatut::Eligible
    } else {
        DossierStatut::EnCours
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_thresholds() {
        assert_eq!(statut_for_score(90), DossierStatut::Eligible);
        assert_eq!(statut_for_score(70), DossierStatut::Eligible);
        assert_eq!(statut_for_score(69), DossierStatut::EnCours);
        assert_eq!(priority_for_score(75), 1);
        assert_eq!(priority_for_score(0), 2);
    }

    #[test]
    fn test_progress_bounds() {
        let req = UpdateDossierProgressRequest {
            current_step: 6,
            progress: 101,
            montant_final: None,
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("current_step"));
        assert!(errors.field_errors().contains_key("progress"));
    }

    #[test]
    fn test_status_change_stamps_eligibility_date() {
        let update = DossierUpdate::status(DossierStatut::Eligible, None);
        assert!(matches!(update.date_eligibilite, Some(Some(_))));
        assert!(update.notes.is_none());

        let update = DossierUpdate::status(DossierStatut::Termine, Some("Remboursé".into()));
        assert!(update.date_eligibilite.is_none());
        assert_eq!(update.notes, Some(Some("Remboursé".to_string())));
    }

    #[test]
    fn test_status_request_rejects_unknown_statut() {
        let parsed: Result<UpdateDossierStatusRequest, _> =
            serde_json::from_value(serde_json::json!({"statut": "archived"}));
        assert!(parsed.is_err());
    }
}
