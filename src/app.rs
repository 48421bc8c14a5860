// Application state shared across handlers
use std::sync::Arc;

use crate::{
    app_config::AppConfig,
    db::DieselPool,
    services::{
        jwt::{JwtConfig, JwtService},
        storage::{DocumentStorage, LocalFsStorage},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub diesel_pool: DieselPool,
    pub jwt_service: Arc<JwtService>,
    pub storage: Arc<dyn DocumentStorage>,
    pub max_connections: u32,
}

impl AppState {
    /// Wires the services that only depend on configuration
    pub fn new(config: AppConfig, diesel_pool: DieselPool) -> Self {
        let jwt_service = Arc::new(JwtService::new(JwtConfig::from_app_config(&config)));
        let storage: Arc<dyn DocumentStorage> =
            Arc::new(LocalFsStorage::new(config.storage.root.clone()));
        let max_connections = config.database.max_connections;

        Self {
            config: Arc::new(config),
            diesel_pool,
            jwt_service,
            storage,
            max_connections,
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn DocumentStorage>) -> Self {
        self.storage = storage;
        self
    }
}
