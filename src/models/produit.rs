// Product catalog: the financial optimisations offered on the platform

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::status::ProduitType;
use crate::schema::produits_eligibles;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, ToSchema)]
#[diesel(table_name = produits_eligibles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProduitEligible {
    pub id: Uuid,
    pub code: String,
    pub nom: String,
    pub description: Option<String>,
    pub categorie: Option<String>,
    pub type_produit: String,
    pub montant_min: Option<f64>,
    pub montant_max: Option<f64>,
    pub taux_min: Option<f64>,
    pub taux_max: Option<f64>,
    pub duree_min: Option<i32>,
    pub duree_max: Option<i32>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = produits_eligibles)]
pub struct NewProduit {
    pub code: String,
    pub nom: String,
    pub description: Option<String>,
    pub categorie: Option<String>,
    pub type_produit: String,
    pub montant_min: Option<f64>,
    pub montant_max: Option<f64>,
    pub taux_min: Option<f64>,
    pub taux_max: Option<f64>,
    pub duree_min: Option<i32>,
    pub duree_max: Option<i32>,
    pub active: bool,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = produits_eligibles)]
pub struct ProduitUpdate {
    pub nom: Option<String>,
    pub description: Option<Option<String>>,
    pub categorie: Option<Option<String>>,
    pub type_produit: Option<String>,
    pub montant_min: Option<Option<f64>>,
    pub montant_max: Option<Option<f64>>,
    pub taux_min: Option<Option<f64>>,
    pub taux_max: Option<Option<f64>>,
    pub duree_min: Option<Option<i32>>,
    pub duree_max: Option<Option<i32>>,
    pub active: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_create_ranges"))]
pub struct CreateProduitRequest {
    #[validate(length(min = 2, max = 50, message = "Code must be 2-50 characters"))]
    pub code: String,
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub nom: String,
    pub description: Option<String>,
    pub categorie: Option<String>,
    #[serde(default = "default_type")]
    pub type_produit: ProduitType,
    pub montant_min: Option<f64>,
    pub montant_max: Option<f64>,
    pub taux_min: Option<f64>,
    pub taux_max: Option<f64>,
    pub duree_min: Option<i32>,
    pub duree_max: Option<i32>,
}

fn default_type() -> ProduitType {
    ProduitType::Financier
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_update_ranges"))]
pub struct UpdateProduitRequest {
    #[validate(length(min = 1, max = 255))]
    pub nom: Option<String>,
    pub description: Option<String>,
    pub categorie: Option<String>,
    pub type_produit: Option<ProduitType>,
    pub montant_min: Option<f64>,
    pub montant_max: Option<f64>,
    pub taux_min: Option<f64>,
    pub taux_max: Option<f64>,
    pub duree_min: Option<i32>,
    pub duree_max: Option<i32>,
    pub active: Option<bool>,
}

fn check_range<T: PartialOrd>(
    min: Option<T>,
    max: Option<T>,
    code: &'static str,
) -> Result<(), ValidationError> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(ValidationError::new(code)),
        _ => Ok(()),
    }
}

fn validate_create_ranges(req: &CreateProduitRequest) -> Result<(), ValidationError> {
    check_range(req.montant_min, req.montant_max, "montant_range")?;
    check_range(req.taux_min, req.taux_max, "taux_range")?;
    check_range(req.duree_min, req.duree_max, "duree_range")
}

fn validate_update_ranges(req: &UpdateProduitRequest) -> Result<(), ValidationError> {
    check_range(req.montant_min, req.montant_max, "montant_range")?;
    check_range(req.taux_min, req.taux_max, "taux_range")?;
    check_range(req.duree_min, req.duree_max, "duree_range")
}

impl CreateProduitRequest {
    pub fn into_new(self) -> NewProduit {
        NewProduit {
            code: self.code.trim().to_uppercase(),
            nom: self.nom.trim().to_string(),
            description: self.description,
            categorie: self.categorie,
            type_produit: self.type_produit.as_str().to_string(),
            montant_min: self.montant_min,
            montant_max: self.montant_max,
            taux_min: self.taux_min,
            taux_max: self.taux_max,
            duree_min: self.duree_min,
            duree_max: self.duree_max,
            active: true,
        }
    }
}

impl UpdateProduitRequest {
    pub fn into_changeset(self) -> ProduitUpdate {
        ProduitUpdate {
            nom: self.nom.map(|n| n.trim().to_string()),
            description: self.description.map(Some),
            categorie: self.categorie.map(Some),
            type_produit: self.type_produit.map(|t| t.as_str().to_string()),
            montant_min: self.montant_min.map(Some),
            montant_max: self.montant_max.map(Some),
            taux_min: self.taux_min.map(Some),
            taux_max: self.taux_max.map(Some),
            duree_min: self.duree_min.map(Some),
            duree_max: self.duree_max.map(Some),
            active: self.active,
            updated_at: Some(Utc::now()),
        }
    }
}

impl ProduitEligible {
    pub async fn find_by_id(conn: &mut AsyncPgConnection, produit_id: Uuid) -> QueryResult<Self> {
        produits_eligibles::table
            .filter(produits_eligibles::id.eq(produit_id))
            .select(ProduitEligible::as_select())
            .first(conn)
            .await
    }

    pub async fn find_by_code(conn: &mut AsyncPgConnection, code: &str) -> QueryResult<Self> {
        produits_eligibles::table
            .filter(produits_eligibles::code.eq(code))
            .select(ProduitEligible::as_select())
            .first(conn)
            .await
    }

    pub async fn find_by_codes(
        conn: &mut AsyncPgConnection,
        codes: &[String],
    ) -> QueryResult<Vec<Self>> {
        produits_eligibles::table
            .filter(produits_eligibles::code.eq_any(codes))
            .select(ProduitEligible::as_select())
            .load(conn)
            .await
    }

    pub async fn list(conn: &mut AsyncPgConnection, active_only: bool) -> QueryResult<Vec<Self>> {
        let mut query = produits_eligibles::table.into_boxed();
        if active_only {
            query = query.filter(produits_eligibles::active.eq(true));
        }
        query
            .order(produits_eligibles::nom.asc())
            .select(ProduitEligible::as_select())
            .load(conn)
            .await
    }

    pub async fn create(conn: &mut AsyncPgConnection, new_produit: NewProduit) -> QueryResult<Self> {
        diesel::insert_into(produits_eligibles::table)
            .values(&new_produit)
            .returning(ProduitEligible::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn update(
        conn: &mut AsyncPgConnection,
        produit_id: Uuid,
        update: ProduitUpdate,
    ) -> QueryResult<Self> {
        diesel::update(produits_eligibles::table.filter(produits_eligibles::id.eq(produit_id)))
            .set(&update)
            .returning(ProduitEligible::as_returning())
            .get_result(conn)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request() -> CreateProduitRequest {
        CreateProduitRequest {
            code: " audit_social ".into(),
            nom: "Audit social".into(),
            description: None,
            categorie: Some("social".into()),
            type_produit: ProduitType::Financier,
            montant_min: Some(1000.0),
            montant_max: Some(50_000.0),
            taux_min: None,
            taux_max: None,
            duree_min: Some(6),
            duree_max: Some(24),
        }
    }

    #[test]
    fn test_code_is_normalized() {
        let new = create_request().into_new();
        assert_eq!(new.code, "AUDIT_SOCIAL");
        assert!(new.active);
        assert_eq!(new.type_produit, "financier");
    }

    #[test]
    fn test_inverted_range_rejected() {
        let mut req = create_request();
        assert!(req.validate().is_ok());
        req.duree_min = Some(36);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_type_defaults_to_financier() {
        let req: CreateProduitRequest =
            serde_json::from_value(serde_json::json!({"code": "CIR", "nom": "Crédit impôt recherche"}))
                .unwrap();
        assert_eq!(req.type_produit, ProduitType::Financier);
    }
}
