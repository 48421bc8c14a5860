// Admin dashboard aggregates

use tracing::instrument;

use crate::{
    app::AppState,
    db::DieselPool,
    models::{
        admin::AdminDashboard, apporteur::Apporteur, client::Client, common::StatusCounts,
        dossier::ClientProduitEligible, expert::Expert, rdv::Rdv, simulation::TemporarySession,
    },
    utils::service_error::ServiceResult,
};

pub const UPCOMING_RDV_DAYS: i64 = 7;

pub struct AdminService {
    diesel_pool: DieselPool,
}

impl AdminService {
    pub fn new(state: &AppState) -> Self {
        Self {
            diesel_pool: state.diesel_pool.clone(),
        }
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> ServiceResult<AdminDashboard> {
        let mut conn = self.diesel_pool.get().await?;
        let clients = Client::count_by_statut(&mut conn, None).await?;
        let experts = Expert::count_by_approval(&mut conn).await?;
        let apporteurs = Apporteur::count_by_status(&mut conn).await?;
        let dossiers = ClientProduitEligible::count_by_statut(&mut conn, None).await?;
        let dossiers_total_amount = ClientProduitEligible::total_amount(&mut conn, None, None).await?;
        let upcoming_rdvs = Rdv::count_upcoming(&mut conn, UPCOMING_RDV_DAYS).await?;
        let open_simulator_sessions = TemporarySession::count_open(&mut conn).await?;

        Ok(AdminDashboard {
            clients: StatusCounts::from_counts(clients),
            experts: StatusCounts::from_counts(experts),
            apporteurs: StatusCounts::from_counts(apporteurs),
            dossiers: StatusCounts::from_counts(dossiers),
            dossiers_total_amount,
            upcoming_rdvs,
            open_simulator_sessions,
        })
    }
}
