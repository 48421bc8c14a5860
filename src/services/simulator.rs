// Anonymous eligibility simulator and client simulations

use std::collections::HashSet;

use chrono::Utc;
use diesel_async::{scoped_futures::ScopedFutureExt, AsyncConnection, AsyncPgConnection};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    db::DieselPool,
    middleware::auth::AuthenticatedUser,
    models::{
        admin::Admin,
        auth::UserType,
        client::Client,
        dossier::{
            priority_for_score, statut_for_score, ClientProduitEligible, NewClientProduitEligible,
        },
        notification::{kinds, NewNotification},
        produit::ProduitEligible,
        simulation::{
            rate, EligibilityResults, NewSimulation, NewTemporaryEligibility,
            NewTemporaryResponse, NewTemporarySession, QuestionnaireQuestion, RunSimulationRequest,
            SaveResponseRequest, SessionCreated, Simulation, SimulatorStats, TemporaryEligibility,
            TemporaryResponse, TemporarySession, SIMULATION_COMPLETED,
        },
        status::NotificationPriority,
    },
    services::{
        calculator::{
            calculate_all_products, format_euros, total_savings, ProductCalculation,
            SimulationAnswers,
        },
        dossier_workflow::open_workflows,
        notification::NotificationService,
    },
    utils::service_error::{OrNotFound, ServiceError, ServiceResult},
};

/// Months used for `duree_finale` on dossiers opened from a simulation
pub const DEFAULT_DOSSIER_DURATION_MONTHS: i32 = 12;

/// Stored form of one calculator result
pub fn eligibility_row(session_id: Uuid, calc: &ProductCalculation) -> NewTemporaryEligibility {
    NewTemporaryEligibility {
        session_id,
        produit_code: calc.produit_code.clone(),
        produit_nom: calc.produit_nom.clone(),
        is_eligible: calc.is_eligible,
        eligibility_score: calc.eligibility_score(),
        estimated_savings: calc.estimated_savings,
        confidence_level: calc.confidence_level().as_str().to_string(),
        calculation_details: json!({
            "type": calc.product_type,
            "formula": calc.calculation_details.formula,
            "inputs": calc.calculation_details.inputs,
            "intermediate_values": calc.calculation_details.intermediate_values,
            "qualitative_benefits": calc.qualitative_benefits,
        }),
        recommendations: calc.recommendations(),
    }
}

/// Dossier opened for a client from a calculator score
pub fn dossier_from_score(
    client_id: Uuid,
    produit_id: Uuid,
    score: i32,
    estimated_savings: Option<f64>,
    simulation_id: Option<Uuid>,
    origin: &str,
) -> NewClientProduitEligible {
    let statut = statut_for_score(score);
    NewClientProduitEligible {
        client_id,
        produit_id,
        expert_id: None,
        statut: statut.as_str().to_string(),
        taux_final: Some(f64::from(score) / 100.0),
        montant_final: estimated_savings,
        duree_finale: Some(DEFAULT_DOSSIER_DURATION_MONTHS),
        priorite: priority_for_score(score),
        simulation_id,
        notes: None,
        metadata: json!({ "source": origin, "eligibility_score": score }),
        date_eligibilite: Some(Utc::now()),
    }
}

/// Result of running the calculator for a registered client
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SimulationOutcome {
    pub simulation: Simulation,
    pub results: Vec<ProductCalculation>,
    pub created_dossiers: Vec<ClientProduitEligible>,
    pub total_savings: f64,
}

pub struct SimulatorService {
    diesel_pool: DieselPool,
    session_ttl_hours: i64,
    high_eligibility_threshold: i32,
}

impl SimulatorService {
    pub fn new(state: &AppState) -> Self {
        Self {
            diesel_pool: state.diesel_pool.clone(),
            session_ttl_hours: state.config.simulator.session_ttl_hours,
            high_eligibility_threshold: state.config.simulator.high_eligibility_threshold,
        }
    }

    #[instrument(skip(self, user_agent))]
    pub async fn create_session(
        &self,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> ServiceResult<SessionCreated> {
        let mut conn = self.diesel_pool.get().await?;
        let session = TemporarySession::create(
            &mut conn,
            NewTemporarySession::new(ip_address, user_agent, self.session_ttl_hours),
        )
        .await?;
        info!(session_id = %session.id, "Simulator session created");
        Ok(SessionCreated {
            session_id: session.id,
            session_token: session.session_token,
            expires_at: session.expires_at,
        })
    }

    pub async fn questions(&self) -> ServiceResult<Vec<QuestionnaireQuestion>> {
        let mut conn = self.diesel_pool.get().await?;
        Ok(QuestionnaireQuestion::list_ordered(&mut conn).await?)
    }

    fn ensure_open(session: &TemporarySession) -> ServiceResult<()> {
        if session.migrated_to_account {
            return Err(ServiceError::ValidationError(
                "Session has already been migrated".to_string(),
            ));
        }
        if session.abandoned {
            return Err(ServiceError::ValidationError(
                "Session has been abandoned".to_string(),
            ));
        }
        if session.is_expired() {
            return Err(ServiceError::ValidationError("Session has expired".to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self, request), fields(question_id = %request.question_id))]
    pub async fn save_response(&self, request: SaveResponseRequest) -> ServiceResult<TemporaryResponse> {
        request.validate()?;
        let mut conn = self.diesel_pool.get().await?;
        let session = TemporarySession::find_by_token(&mut conn, &request.session_token)
            .await
            .or_not_found("Session")?;
        Self::ensure_open(&session)?;
        QuestionnaireQuestion::find_by_id(&mut conn, request.question_id)
            .await
            .or_not_found("Question")?;

        Ok(TemporaryResponse::upsert(
            &mut conn,
            NewTemporaryResponse {
                session_id: session.id,
                question_id: request.question_id,
                response_value: request.response_value,
            },
        )
        .await?)
    }

    /// Runs the calculator over the stored answers and replaces the session's results
    #[instrument(skip(self))]
    pub async fn calculate(&self, reference: &str) -> ServiceResult<EligibilityResults> {
        let mut conn = self.diesel_pool.get().await?;
        let session = TemporarySession::find_by_reference(&mut conn, reference)
            .await
            .or_not_found("Session")?;
        Self::ensure_open(&session)?;

        let answers = TemporaryResponse::answers_for_session(&mut conn, session.id).await?;
        if answers.is_empty() {
            return Err(ServiceError::ValidationError(
                "No answers recorded for this session".to_string(),
            ));
        }
        let calcs = calculate_all_products(&SimulationAnswers::from_pairs(
            answers.iter().map(|(code, value)| (code.as_str(), value)),
        ));
        let savings = total_savings(&calcs);
        let rows: Vec<NewTemporaryEligibility> =
            calcs.iter().map(|c| eligibility_row(session.id, c)).collect();

        let session_id = session.id;
        let results = conn
            .transaction::<_, ServiceError, _>(|conn| {
                async move {
                    let results =
                        TemporaryEligibility::replace_for_session(conn, session_id, &rows).await?;
                    TemporarySession::mark_completed(conn, session_id).await?;
                    Ok(results)
                }
                .scope_boxed()
            })
            .await?;

        let hot: Vec<&TemporaryEligibility> = results
            .iter()
            .filter(|r| r.eligibility_score >= self.high_eligibility_threshold)
            .collect();
        if !hot.is_empty() {
            if let Err(e) = Self::alert_admins(&mut conn, &session, &hot).await {
                warn!(session_id = %session_id, error = %e, "High eligibility alert failed");
            }
        }

        info!(
            session_id = %session_id,
            eligible = results.iter().filter(|r| r.is_eligible).count(),
            total_savings = savings,
            "Eligibility calculated"
        );
        Ok(EligibilityResults {
            session_id,
            session_token: session.session_token,
            completed: true,
            results,
            total_savings: savings,
        })
    }

    async fn alert_admins(
        conn: &mut AsyncPgConnection,
        session: &TemporarySession,
        hot: &[&TemporaryEligibility],
    ) -> ServiceResult<usize> {
        let savings: f64 = hot.iter().filter_map(|r| r.estimated_savings).sum();
        let products: Vec<&str> = hot.iter().map(|r| r.produit_code.as_str()).collect();
        let admins = Admin::active_ids(conn).await?;
        let notifications = admins
            .into_iter()
            .map(|admin_id| {
                NewNotification::new(
                    admin_id,
                    UserType::Admin,
                    kinds::HIGH_ELIGIBILITY_LEAD,
                    "Forte éligibilité détectée",
                    format!(
                        "Une simulation anonyme révèle {}€ d'économies potentielles ({}).",
                        format_euros(savings),
                        products.join(", ")
                    ),
                )
                .priority(NotificationPriority::High)
                .metadata(json!({
                    "session_id": session.id,
                    "ip_address": session.ip_address,
                    "products": products,
                    "total_savings": savings,
                }))
            })
            .collect();
        NotificationService::notify_many(conn, notifications).await
    }

    async fn results_for(
        conn: &mut AsyncPgConnection,
        session: TemporarySession,
    ) -> ServiceResult<EligibilityResults> {
        let results = TemporaryEligibility::list_for_session(conn, session.id).await?;
        let savings = results.iter().filter_map(|r| r.estimated_savings).sum();
        Ok(EligibilityResults {
            session_id: session.id,
            session_token: session.session_token,
            completed: session.completed,
            results,
            total_savings: savings,
        })
    }

    pub async fn results_by_id(&self, session_id: Uuid) -> ServiceResult<EligibilityResults> {
        let mut conn = self.diesel_pool.get().await?;
        let session = TemporarySession::find_by_id(&mut conn, session_id)
            .await
            .or_not_found("Session")?;
        Self::results_for(&mut conn, session).await
    }

    pub async fn results_by_token(&self, token: &str) -> ServiceResult<EligibilityResults> {
        let mut conn = self.diesel_pool.get().await?;
        let session = TemporarySession::find_by_token(&mut conn, token)
            .await
            .or_not_found("Session")?;
        Self::results_for(&mut conn, session).await
    }

    pub async fn abandon(&self, reference: &str) -> ServiceResult<()> {
        let mut conn = self.diesel_pool.get().await?;
        let session = TemporarySession::find_by_reference(&mut conn, reference)
            .await
            .or_not_found("Session")?;
        if session.migrated_to_account {
            return Err(ServiceError::ValidationError(
                "A migrated session cannot be abandoned".to_string(),
            ));
        }
        TemporarySession::mark_abandoned(&mut conn, session.id).await?;
        info!(session_id = %session.id, "Simulator session abandoned");
        Ok(())
    }

    pub async fn stats(&self) -> ServiceResult<SimulatorStats> {
        let mut conn = self.diesel_pool.get().await?;
        let (total, completed, migrated) = TemporarySession::counts(&mut conn).await?;
        let open = TemporarySession::count_open(&mut conn).await?;
        Ok(SimulatorStats {
            total_sessions: total,
            completed_sessions: completed,
            migrated_sessions: migrated,
            open_sessions: open,
            conversion_rate: rate(migrated, total),
            completion_rate: rate(completed, total),
        })
    }

    /// The authenticated client simulates for itself
    pub async fn run_for_self(
        &self,
        user: &AuthenticatedUser,
        request: RunSimulationRequest,
    ) -> ServiceResult<SimulationOutcome> {
        user.require(&[UserType::Client])?;
        self.run_for_client(user.user_id, "client", request).await
    }

    /// An admin simulates on behalf of a client
    pub async fn run_on_behalf(
        &self,
        user: &AuthenticatedUser,
        client_id: Uuid,
        request: RunSimulationRequest,
    ) -> ServiceResult<SimulationOutcome> {
        user.require(&[UserType::Admin])?;
        self.run_for_client(client_id, "admin", request).await
    }

    /// Persists a Simulation and opens dossiers for eligible products the client does not have yet
    #[instrument(skip(self, request))]
    async fn run_for_client(
        &self,
        client_id: Uuid,
        source: &str,
        request: RunSimulationRequest,
    ) -> ServiceResult<SimulationOutcome> {
        if request.answers.is_empty() {
            return Err(ServiceError::ValidationError("answers cannot be empty".to_string()));
        }
        let calcs = calculate_all_products(&SimulationAnswers::from_map(&request.answers));
        let savings = total_savings(&calcs);

        let mut conn = self.diesel_pool.get().await?;
        Client::find_by_id(&mut conn, client_id)
            .await
            .or_not_found("Client")?;

        let eligible_codes: Vec<String> = calcs
            .iter()
            .filter(|c| c.is_eligible)
            .map(|c| c.produit_code.clone())
            .collect();
        let produits = ProduitEligible::find_by_codes(&mut conn, &eligible_codes).await?;
        let existing: HashSet<Uuid> =
            ClientProduitEligible::produit_ids_for_client(&mut conn, client_id)
                .await?
                .into_iter()
                .collect();

        let answers = Value::Object(request.answers);
        let results_json = serde_json::to_value(&calcs).map_err(|e| {
            warn!(error = %e, "Could not serialize calculator results");
            ServiceError::InternalError
        })?;
        let source = source.to_string();
        let calcs_for_tx = calcs.clone();

        let (simulation, created_dossiers) = conn
            .transaction::<_, ServiceError, _>(|conn| {
                async move {
                    let simulation = Simulation::create(
                        conn,
                        NewSimulation {
                            client_id,
                            answers,
                            results: results_json,
                            source: source.clone(),
                            status: SIMULATION_COMPLETED.to_string(),
                        },
                    )
                    .await?;

                    let new_dossiers: Vec<NewClientProduitEligible> = calcs_for_tx
                        .iter()
                        .filter(|c| c.is_eligible)
                        .filter_map(|c| {
                            let produit = produits.iter().find(|p| p.code == c.produit_code)?;
                            if existing.contains(&produit.id) || !produit.active {
                                return None;
                            }
                            Some(dossier_from_score(
                                client_id,
                                produit.id,
                                c.eligibility_score(),
                                c.estimated_savings,
                                Some(simulation.id),
                                &source,
                            ))
                        })
                        .collect();
                    let created = ClientProduitEligible::create_many(conn, &new_dossiers).await?;
                    open_workflows(conn, &created, None).await?;
                    Ok((simulation, created))
                }
                .scope_boxed()
            })
            .await?;

        info!(
            client_id = %client_id,
            simulation_id = %simulation.id,
            dossiers = created_dossiers.len(),
            "Client simulation saved"
        );
        Ok(SimulationOutcome {
            simulation,
            results: calcs,
            created_dossiers,
            total_savings: savings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::status::DossierStatut;
    use crate::services::calculator::SCORE_FINANCIAL_ELIGIBLE;

    fn transport_answers() -> SimulationAnswers {
        SimulationAnswers {
            secteur: Some("Transport routier de marchandises".into()),
            nb_employes_tranche: Some("6 à 20".into()),
            possede_vehicules: Some("Oui".into()),
            types_vehicules: vec!["Camions de plus de 7,5 tonnes".into()],
            litres_carburant_mois: Some(5000.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_eligibility_row_carries_scores() {
        let session_id = Uuid::new_v4();
        let calcs = calculate_all_products(&transport_answers());
        let urssaf = calcs.iter().find(|c| c.produit_code == "URSSAF").unwrap();

        let row = eligibility_row(session_id, urssaf);
        assert_eq!(row.session_id, session_id);
        assert!(row.is_eligible);
        assert_eq!(row.eligibility_score, SCORE_FINANCIAL_ELIGIBLE);
        assert_eq!(row.confidence_level, "eleve");
        assert_eq!(row.calculation_details["type"], "financier");
        assert!(row.recommendations[0].contains("45 500"));
    }

    #[test]
    fn test_dossier_from_score() {
        let client = Uuid::new_v4();
        let produit = Uuid::new_v4();
        let dossier = dossier_from_score(client, produit, 90, Some(12_000.0), None, "client");
        assert_eq!(dossier.statut, DossierStatut::Eligible.as_str());
        assert_eq!(dossier.priorite, 1);
        assert_eq!(dossier.taux_final, Some(0.9));
        assert_eq!(dossier.duree_finale, Some(12));
        assert_eq!(dossier.montant_final, Some(12_000.0));

        let low = dossier_from_score(client, produit, 0, None, None, "client");
        assert_eq!(low.statut, DossierStatut::EnCours.as_str());
        assert_eq!(low.priorite, 2);
    }

    #[test]
    fn test_open_session_checks() {
        let mut session = TemporarySession {
            id: Uuid::new_v4(),
            session_token: "t".into(),
            ip_address: None,
            user_agent: None,
            completed: false,
            abandoned: false,
            migrated_to_account: false,
            migrated_at: None,
            client_id: None,
            expires_at: Utc::now() + chrono::Duration::hours(1),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(SimulatorService::ensure_open(&session).is_ok());
        session.abandoned = true;
        assert!(SimulatorService::ensure_open(&session).is_err());
        session.abandoned = false;
        session.expires_at = Utc::now() - chrono::Duration::minutes(1);
        assert!(SimulatorService::ensure_open(&session).is_err());
    }
}
