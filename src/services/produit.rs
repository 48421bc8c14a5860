// Product catalog reads and admin maintenance

use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    db::DieselPool,
    middleware::auth::AuthenticatedUser,
    models::produit::{
        CreateProduitRequest, ProduitEligible, ProduitUpdate, UpdateProduitRequest,
    },
    utils::{
        audit_logger::{AuditAction, AuditLogger},
        service_error::{OrNotFound, ServiceError, ServiceResult},
    },
};

pub struct ProduitService {
    diesel_pool: DieselPool,
}

impl ProduitService {
    pub fn new(state: &AppState) -> Self {
        Self {
            diesel_pool: state.diesel_pool.clone(),
        }
    }

    /// Public catalog: active products only
    pub async fn list_active(&self) -> ServiceResult<Vec<ProduitEligible>> {
        let mut conn = self.diesel_pool.get().await?;
        Ok(ProduitEligible::list(&mut conn, true).await?)
    }

    /// Inactive products are hidden from everyone but admins
    pub async fn get(
        &self,
        user: Option<&AuthenticatedUser>,
        produit_id: Uuid,
    ) -> ServiceResult<ProduitEligible> {
        let mut conn = self.diesel_pool.get().await?;
        let produit = ProduitEligible::find_by_id(&mut conn, produit_id)
            .await
            .or_not_found("Produit")?;
        if !produit.active && !user.is_some_and(AuthenticatedUser::is_admin) {
            return Err(ServiceError::NotFound("Produit"));
        }
        Ok(produit)
    }

    pub async fn list_all(&self) -> ServiceResult<Vec<ProduitEligible>> {
        let mut conn = self.diesel_pool.get().await?;
        Ok(ProduitEligible::list(&mut conn, false).await?)
    }

    #[instrument(skip(self, admin, request), fields(code = %request.code))]
    pub async fn create(
        &self,
        admin: &AuthenticatedUser,
        request: CreateProduitRequest,
    ) -> ServiceResult<ProduitEligible> {
        request.validate()?;
        let new_produit = request.into_new();

        let mut conn = self.diesel_pool.get().await?;
        let produit = ProduitEligible::create(&mut conn, new_produit)
            .await
            .map_err(|e| match ServiceError::from(e) {
                ServiceError::Conflict(_) => {
                    ServiceError::Conflict("A product with this code already exists".to_string())
                },
                other => other,
            })?;

        AuditLogger::log_action(
            AuditAction::ProduitChanged,
            admin.actor(),
            "produit",
            Some(produit.id),
            Some(json!({ "operation": "create", "code": produit.code })),
        )
        .await;
        info!(produit_id = %produit.id, "Product created");
        Ok(produit)
    }

    #[instrument(skip(self, admin, request))]
    pub async fn update(
        &self,
        admin: &AuthenticatedUser,
        produit_id: Uuid,
        request: UpdateProduitRequest,
    ) -> ServiceResult<ProduitEligible> {
        request.validate()?;
        let mut conn = self.diesel_pool.get().await?;
        let produit = ProduitEligible::update(&mut conn, produit_id, request.into_changeset())
            .await
            .or_not_found("Produit")?;

        AuditLogger::log_action(
            AuditAction::ProduitChanged,
            admin.actor(),
            "produit",
            Some(produit.id),
            Some(json!({ "operation": "update", "active": produit.active })),
        )
        .await;
        Ok(produit)
    }

    /// Products are never hard-deleted: dossiers keep referencing them
    #[instrument(skip(self, admin))]
    pub async fn deactivate(
        &self,
        admin: &AuthenticatedUser,
        produit_id: Uuid,
    ) -> ServiceResult<ProduitEligible> {
        let mut conn = self.diesel_pool.get().await?;
        let produit = ProduitEligible::update(
            &mut conn,
            produit_id,
            ProduitUpdate {
                active: Some(false),
                updated_at: Some(chrono::Utc::now()),
                ..Default::default()
            },
        )
        .await
        .or_not_found("Produit")?;

        AuditLogger::log_action(
            AuditAction::ProduitChanged,
            admin.actor(),
            "produit",
            Some(produit.id),
            Some(json!({ "operation": "deactivate" })),
        )
        .await;
        info!(produit_id = %produit.id, "Product deactivated");
        Ok(produit)
    }
}
