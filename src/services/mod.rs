// Business logic layer: one service per resource, built from AppState per request

pub mod admin;
pub mod apporteur;
pub mod auth;
pub mod background_tasks;
pub mod calculator;
pub mod client;
pub mod document;
pub mod dossier;
pub mod dossier_workflow;
pub mod expert;
pub mod jwt;
pub mod notification;
pub mod produit;
pub mod rdv;
pub mod session_migration;
pub mod simulator;
pub mod storage;

// Re-export commonly used services
pub use admin::AdminService;
pub use apporteur::ApporteurService;
pub use auth::AuthService;
pub use background_tasks::initialize_background_tasks;
pub use client::ClientService;
pub use document::DocumentService;
pub use dossier::DossierService;
pub use dossier_workflow::DossierWorkflowService;
pub use expert::ExpertService;
pub use jwt::{JwtConfig, JwtError, JwtService};
pub use notification::NotificationService;
pub use produit::ProduitService;
pub use rdv::RdvService;
pub use session_migration::SessionMigrationService;
pub use simulator::SimulatorService;
pub use storage::{DocumentStorage, LocalFsStorage};
