pub mod admin;
pub mod apporteur;
pub mod auth;
pub mod client;
pub mod common;
pub mod document;
pub mod dossier;
pub mod dossier_workflow;
pub mod expert;
pub mod notification;
pub mod produit;
pub mod rdv;
pub mod simulation;
pub mod status;

// Re-export common types
pub use admin::Admin;
pub use apporteur::{Apporteur, NewApporteur};
pub use auth::*;
pub use client::{Client, NewClient};
pub use common::{ApiResponse, Paginated, PaginationMeta, PaginationQuery};
pub use document::DocumentFile;
pub use dossier::{ClientProduitEligible, DossierView, NewClientProduitEligible};
pub use dossier_workflow::{DossierComment, DossierStep, DossierTimelineEvent};
pub use expert::{Expert, ExpertPublic, NewExpert};
pub use notification::{NewNotification, Notification, NotificationPreferences};
pub use produit::ProduitEligible;
pub use rdv::{Rdv, RdvProduit};
pub use simulation::{
    QuestionnaireQuestion, Simulation, TemporaryEligibility, TemporaryResponse, TemporarySession,
};
