// Turns a completed anonymous simulator session into a client account with dossiers

use std::sync::Arc;

use diesel_async::{scoped_futures::ScopedFutureExt, AsyncConnection, AsyncPgConnection};
use serde_json::{json, Map, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    db::DieselPool,
    models::{
        admin::Admin,
        auth::UserType,
        client::{Client, NewClient},
        dossier::ClientProduitEligible,
        notification::{kinds, NewNotification},
        produit::ProduitEligible,
        simulation::{
            MigrateSessionRequest, MigrationDetails, MigrationResult, NewSimulation, Simulation,
            TemporaryEligibility, TemporaryResponse, TemporarySession, SIMULATION_COMPLETED,
        },
        status::{ClientSource, ClientStatut},
    },
    services::{
        calculator::{employees_for_bracket, SimulationAnswers},
        dossier_workflow::open_workflows,
        jwt::JwtService,
        notification::NotificationService,
        simulator::dossier_from_score,
    },
    utils::{
        audit_logger::{AuditAction, AuditLogger},
        password::hash_password,
        service_error::{OrNotFound, ServiceError, ServiceResult},
        validation::{normalize_siren, trim_optional_field},
    },
};

pub const DEFAULT_COMPANY_AGE_YEARS: i32 = 5;
const DEFAULT_REVENUE_PER_EMPLOYEE: f64 = 80_000.0;

const REVENUE_PER_EMPLOYEE: &[(&str, f64)] = &[
    ("transport", 80_000.0),
    ("logistique", 75_000.0),
    ("industrie", 90_000.0),
    ("commerce", 70_000.0),
    ("services", 85_000.0),
    ("immobilier", 120_000.0),
    ("agriculture", 60_000.0),
    ("agricole", 60_000.0),
    ("construction", 80_000.0),
    ("technologie", 100_000.0),
];

/// Company profile inferred from simulator answers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedClientData {
    pub secteur_activite: Option<String>,
    pub nombre_employes: Option<i32>,
    pub revenu_annuel: Option<f64>,
    pub anciennete_entreprise: i32,
}

pub fn estimate_revenue_per_employee(secteur: &str) -> f64 {
    let secteur = secteur.to_lowercase();
    REVENUE_PER_EMPLOYEE
        .iter()
        .find(|(keyword, _)| secteur.contains(keyword))
        .map(|(_, revenue)| *revenue)
        .unwrap_or(DEFAULT_REVENUE_PER_EMPLOYEE)
}

pub fn extract_client_data(answers: &SimulationAnswers) -> ExtractedClientData {
    let nombre_employes = answers
        .nb_employes_tranche
        .as_deref()
        .map(employees_for_bracket);
    let revenu_annuel = match (&answers.secteur, nombre_employes) {
        (Some(secteur), Some(employees)) if employees > 0 => {
            Some(f64::from(employees) * estimate_revenue_per_employee(secteur))
        },
        _ => None,
    };
    ExtractedClientData {
        secteur_activite: answers.secteur.clone(),
        nombre_employes,
        revenu_annuel,
        anciennete_entreprise: DEFAULT_COMPANY_AGE_YEARS,
    }
}

pub struct SessionMigrationService {
    diesel_pool: DieselPool,
    jwt_service: Arc<JwtService>,
}

impl SessionMigrationService {
    pub fn new(state: &AppState) -> Self {
        Self {
            diesel_pool: state.diesel_pool.clone(),
            jwt_service: state.jwt_service.clone(),
        }
    }

    /// Everything is written in one transaction: on failure no client, dossier
    /// or simulation is left behind and the session stays migratable.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn migrate(
        &self,
        session_token: &str,
        request: MigrateSessionRequest,
    ) -> ServiceResult<MigrationResult> {
        let mut request = request;
        request.siren = request.siren.as_deref().map(normalize_siren);
        request.validate()?;

        let mut conn = self.diesel_pool.get().await?;
        let session = TemporarySession::find_by_token(&mut conn, session_token)
            .await
            .or_not_found("Session")?;
        session
            .can_migrate()
            .map_err(|blocker| ServiceError::ValidationError(blocker.message().to_string()))?;

        let answers = TemporaryResponse::answers_for_session(&mut conn, session.id).await?;
        if answers.is_empty() {
            return Err(ServiceError::ValidationError(
                "No answers recorded for this session".to_string(),
            ));
        }
        let eligibilities = TemporaryEligibility::list_for_session(&mut conn, session.id).await?;
        if eligibilities.is_empty() {
            return Err(ServiceError::ValidationError(
                "No eligibility results for this session".to_string(),
            ));
        }

        let email = request.email.trim().to_lowercase();
        if Client::email_exists(&mut conn, &email).await? {
            return Err(ServiceError::Conflict(
                "An account already exists for this email".to_string(),
            ));
        }

        let extracted = extract_client_data(&SimulationAnswers::from_pairs(
            answers.iter().map(|(code, value)| (code.as_str(), value)),
        ));
        let codes: Vec<String> = eligibilities.iter().map(|e| e.produit_code.clone()).collect();
        let produits = ProduitEligible::find_by_codes(&mut conn, &codes).await?;
        let password_hash = hash_password(&request.password)?;

        let answers_json: Map<String, Value> = answers.into_iter().collect();
        let results_json = json!(eligibilities);
        let new_client = NewClient {
            email: email.clone(),
            password_hash: Some(password_hash),
            username: request.username.trim().to_string(),
            company_name: Some(request.company_name.trim().to_string()),
            phone_number: trim_optional_field(request.phone_number.as_ref()),
            address: trim_optional_field(request.address.as_ref()),
            city: trim_optional_field(request.city.as_ref()),
            postal_code: trim_optional_field(request.postal_code.as_ref()),
            siren: request.siren.clone(),
            secteur_activite: extracted.secteur_activite.clone(),
            nombre_employes: extracted.nombre_employes,
            revenu_annuel: extracted.revenu_annuel,
            anciennete_entreprise: Some(extracted.anciennete_entreprise),
            statut: ClientStatut::EnAttente.as_str().to_string(),
            source: ClientSource::SimulatorMigration.as_str().to_string(),
            apporteur_id: None,
            metadata: json!({
                "session_token": session.session_token,
                "session_id": session.id,
            }),
        };

        let session_id = session.id;
        let (client, migrated_products) = conn
            .transaction::<_, ServiceError, _>(|conn| {
                async move {
                    let client = Client::create(conn, new_client).await?;

                    let simulation = Simulation::create(
                        conn,
                        NewSimulation {
                            client_id: client.id,
                            answers: Value::Object(answers_json),
                            results: results_json,
                            source: ClientSource::SimulatorMigration.as_str().to_string(),
                            status: SIMULATION_COMPLETED.to_string(),
                        },
                    )
                    .await?;

                    // One dossier per scored product, eligible or not
                    let new_dossiers: Vec<_> = eligibilities
                        .iter()
                        .filter_map(|e| {
                            let produit = produits.iter().find(|p| p.code == e.produit_code)?;
                            Some(dossier_from_score(
                                client.id,
                                produit.id,
                                e.eligibility_score,
                                e.estimated_savings,
                                Some(simulation.id),
                                ClientSource::SimulatorMigration.as_str(),
                            ))
                        })
                        .collect();
                    let dossiers = ClientProduitEligible::create_many(conn, &new_dossiers).await?;
                    open_workflows(conn, &dossiers, None).await?;

                    if TemporarySession::mark_migrated(conn, session_id, client.id).await? == 0 {
                        return Err(ServiceError::Conflict(
                            "Session has already been migrated".to_string(),
                        ));
                    }

                    let migrated_products: Vec<String> = dossiers
                        .iter()
                        .filter_map(|d| {
                            produits
                                .iter()
                                .find(|p| p.id == d.produit_id)
                                .map(|p| p.code.clone())
                        })
                        .collect();

                    Ok((client, migrated_products))
                }
                .scope_boxed()
            })
            .await?;

        if let Err(e) = Self::alert_admins(&mut conn, &client, &migrated_products).await {
            warn!(error = %e, client_id = %client.id, "Failed to notify admins of new client");
        }

        let pair = self
            .jwt_service
            .generate_token_pair(client.id, &client.email, UserType::Client)
            .map_err(|e| {
                tracing::error!(error = %e, "Token generation failed after migration");
                ServiceError::InternalError
            })?;

        AuditLogger::log_action(
            AuditAction::SessionMigrated,
            Some((client.id, UserType::Client.as_str())),
            "temporary_session",
            Some(session_id),
            Some(json!({ "products": migrated_products })),
        )
        .await;
        info!(
            session_id = %session_id,
            client_id = %client.id,
            products = migrated_products.len(),
            "Simulator session migrated"
        );

        Ok(MigrationResult {
            client_id: client.id,
            migrated_products,
            token: pair.token,
            refresh_token: pair.refresh_token,
            details: MigrationDetails {
                client_created: true,
                responses_migrated: true,
                eligibility_migrated: true,
                session_migrated: true,
            },
        })
    }

    async fn alert_admins(
        conn: &mut AsyncPgConnection,
        client: &Client,
        products: &[String],
    ) -> ServiceResult<usize> {
        let admins = Admin::active_ids(conn).await?;
        let company = client.company_name.as_deref().unwrap_or(&client.username);
        let notifications = admins
            .into_iter()
            .map(|admin_id| {
                NewNotification::new(
                    admin_id,
                    UserType::Admin,
                    kinds::NEW_CLIENT_FROM_SIMULATOR,
                    "Nouveau client issu du simulateur",
                    format!(
                        "{} a créé son compte avec {} dossier(s) ouvert(s).",
                        company,
                        products.len()
                    ),
                )
                .action_url(format!("/admin/clients/{}", client.id))
                .metadata(json!({ "client_id": client.id, "products": products }))
            })
            .collect();
        NotificationService::notify_many(conn, notifications).await
    }

    /// Session and client linked by a migration, if any
    pub async fn migrated_client(&self, session_token: &str) -> ServiceResult<Option<Uuid>> {
        let mut conn = self.diesel_pool.get().await?;
        let session = TemporarySession::find_by_token(&mut conn, session_token)
            .await
            .or_not_found("Session")?;
        Ok(session.client_id.filter(|_| session.migrated_to_account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revenue_per_employee_by_keyword() {
        assert_eq!(
            estimate_revenue_per_employee("Transport routier de marchandises"),
            80_000.0
        );
        assert_eq!(estimate_revenue_per_employee("Immobilier"), 120_000.0);
        assert_eq!(estimate_revenue_per_employee("Secteur Agricole"), 60_000.0);
        assert_eq!(estimate_revenue_per_employee("Restauration"), 80_000.0);
    }

    #[test]
    fn test_extract_client_data_from_answers() {
        let answers = SimulationAnswers {
            secteur: Some("Transport routier de marchandises".into()),
            nb_employes_tranche: Some("6 à 20".into()),
            ..Default::default()
        };
        let data = extract_client_data(&answers);
        assert_eq!(data.nombre_employes, Some(13));
        assert_eq!(data.revenu_annuel, Some(1_040_000.0));
        assert_eq!(data.anciennete_entreprise, DEFAULT_COMPANY_AGE_YEARS);
    }

    #[test]
    fn test_extract_without_employees_has_no_revenue() {
        let answers = SimulationAnswers {
            secteur: Some("Commerce".into()),
            nb_employes_tranche: Some("Aucun".into()),
            ..Default::default()
        };
        let data = extract_client_data(&answers);
        assert_eq!(data.nombre_employes, Some(0));
        assert_eq!(data.revenu_annuel, None);

        let empty = extract_client_data(&SimulationAnswers::default());
        assert_eq!(empty.secteur_activite, None);
        assert_eq!(empty.nombre_employes, None);
    }

    #[test]
    fn test_migration_request_validation() {
        let req: MigrateSessionRequest = serde_json::from_value(json!({
            "email": "not-an-email",
            "password": "short",
            "username": "Jean",
            "company_name": "Transports Jean"
        }))
        .unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
        assert!(errors.field_errors().contains_key("password"));
    }
}
