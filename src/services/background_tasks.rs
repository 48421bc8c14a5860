// Periodic maintenance jobs

use std::time::Duration;

use tracing::{error, info};

use crate::{app::AppState, db::DieselPool, models::simulation::TemporarySession};

/// Spawn the expired simulator session sweeper.
/// Migrated sessions are kept; everything else past its expiry is removed with its answers and results.
pub fn spawn_session_cleanup(state: &AppState) {
    if !state.config.features.enable_session_cleanup || state.config.is_test() {
        info!("Simulator session cleanup is disabled in configuration");
        return;
    }

    let pool = state.diesel_pool.clone();
    let every = Duration::from_secs(state.config.simulator.cleanup_interval_seconds.max(60));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match cleanup_expired_sessions(&pool).await {
                Ok(0) => {},
                Ok(count) => info!(count, "Removed expired simulator sessions"),
                Err(e) => error!("Simulator session cleanup failed: {}", e),
            }
        }
    });
    info!(interval_secs = every.as_secs(), "Simulator session cleanup scheduled");
}

pub async fn cleanup_expired_sessions(
    pool: &DieselPool,
) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
    let mut conn = pool.get().await?;
    Ok(TemporarySession::delete_expired(&mut conn).await?)
}

/// Initialize background tasks (call this in main.rs)
pub fn initialize_background_tasks(state: &AppState) {
    spawn_session_cleanup(state);
}
