// Library exports for the Profitum backend
// The binary and the integration tests both build on these modules

pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use app::AppState;
pub use app_config::{AppConfig, CONFIG};
pub use db::DieselPool;
pub use handlers::api_router;
pub use middleware::{auth_middleware, AuthenticatedUser};
pub use models::auth::{AccessTokenClaims, RefreshTokenClaims, UserType};
pub use services::{JwtConfig, JwtError, JwtService};
pub use utils::{ServiceError, ServiceResult};

/// Load configuration, open the pool and apply pending migrations
pub async fn initialize_app_state() -> Result<AppState, Box<dyn std::error::Error>> {
    use tracing::{info, warn};

    dotenv::dotenv().ok();

    let config = app_config::config().clone();

    info!(
        "Initializing database pool for {}",
        db::mask_connection_string(&config.database_url)
    );
    let diesel_pool = db::create_diesel_pool(db::DieselDatabaseConfig::from_app_config(&config))
        .await?;

    if migrations::should_run_migrations(&config) {
        info!("Running embedded migrations...");
        migrations::run_all_migrations(migrations::MigrationConfig::from_app_config(&config))
            .await
            .map_err(|e| format!("Migration failed: {}", e))?;
    } else {
        match migrations::check_migration_status(&config.database_url).await {
            Ok(status) if !status.is_up_to_date() => warn!(
                pending = ?status.pending_migrations,
                "Embedded migrations are disabled and {} are pending",
                status.pending_count
            ),
            Ok(status) => info!("Schema up to date ({} migrations applied)", status.applied_count),
            Err(e) => warn!("Could not read migration status: {}", e),
        }
    }

    Ok(AppState::new(config, diesel_pool))
}
