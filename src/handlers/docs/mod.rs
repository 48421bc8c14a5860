// OpenAPI document assembled from the `#[utoipa::path]` annotations on handlers
pub mod swagger_ui;

use axum::{
    extract::{OriginalUri, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use utoipa::{
    openapi::{
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
        Server,
    },
    Modify, OpenApi,
};

use crate::app::AppState;
use crate::app_config::AppConfig;
use crate::handlers::{
    admin, apporteur, auth, client, documents, dossier_workflow, dossiers, experts, health,
    notifications, produits, rdv, simulator,
};
use crate::models::{
    admin::AdminDashboard,
    apporteur::{
        Apporteur, ApporteurStats, CreateApporteurRequest, CreateProspectRequest,
        ProspectCredentials, UpdateApporteurRequest, UpdateApporteurStatusRequest,
    },
    auth::{
        AccountProfile, ChangePasswordRequest, CheckSirenRequest, LoginRequest, LoginResponse,
        RefreshRequest, RefreshResponse, RegisterClientRequest, SirenAvailability, TokenInfo,
        TypedLoginRequest, UserType,
    },
    client::{
        Client, ClientDetail, CreateClientRequest, CreatedClient, UpdateClientProfileRequest,
        UpdateClientStatusRequest,
    },
    common::{AffectedCount, PaginationMeta, StatusCounts},
    document::{DocumentFile, UpdateDocumentRequest, UploadDocumentRequest, ValidateDocumentRequest},
    dossier::{
        AssignExpertRequest, ClientProduitEligible, CreateDossierRequest, DossierView,
        UpdateDossierProgressRequest, UpdateDossierStatusRequest,
    },
    dossier_workflow::{
        CreateCommentRequest, CreateTimelineEventRequest, DossierComment, DossierStep,
        DossierTimelineEvent, TimelinePage, UpdateCommentRequest, UpdateStepRequest,
    },
    expert::{CreateExpertRequest, Expert, ExpertPublic, RejectExpertRequest, UpdateExpertRequest},
    notification::{
        CreateNotificationRequest, Notification, NotificationPreferences, StarRequest,
        UpdatePreferencesRequest,
    },
    produit::{CreateProduitRequest, ProduitEligible, UpdateProduitRequest},
    rdv::{
        CalendarEvent, CreateRdvRequest, MarkCompletedRequest, Rdv, RdvAction, RdvDetail,
        RdvProduitInput, RdvProduitView, RdvResponseRequest, UpdateRdvRequest,
    },
    simulation::{
        EligibilityResults, MigrateSessionRequest, MigrationDetails, MigrationResult,
        QuestionnaireQuestion, RunSimulationRequest, SaveResponseRequest, SessionCreated,
        SessionReferenceRequest, Simulation, SimulatorStats, TemporaryEligibility,
        TemporaryResponse,
    },
    status::{
        ApporteurStatus, ApprovalStatus, ClientSource, ClientStatut, CommentCategory,
        DocumentCategory, DocumentStatus, DossierStatut, ExpertStatus, MeetingType,
        NotificationPriority, NotificationStatus, ProduitType, QuestionType, RdvCategory,
        RdvStatus, StepStatus, StepType, TimelineEventType,
    },
};
use crate::services::{
    calculator::{CalculationDetails, ProductCalculation},
    rdv::RdvListing,
    simulator::SimulationOutcome,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Profitum API",
        version = "1.0.0",
        description = "Financial-optimisation platform: eligibility simulator, client dossiers, expert marketplace and apporteur referrals"
    ),
    paths(
        health::health_check,
        auth::login_typed,
        auth::login,
        auth::register,
        auth::check_siren,
        auth::refresh,
        auth::me,
        auth::verify,
        auth::change_password,
        client::get_profile,
        client::update_profile,
        client::list_clients,
        client::get_client,
        client::create_client,
        client::update_client_status,
        client::delete_client,
        client::client_stats,
        experts::marketplace,
        experts::marketplace_get,
        experts::get_profile,
        experts::update_profile,
        experts::assigned_dossiers,
        experts::list_experts,
        experts::get_expert,
        experts::create_expert,
        experts::update_expert,
        experts::approve_expert,
        experts::reject_expert,
        experts::suspend_expert,
        experts::reactivate_expert,
        experts::delete_expert,
        experts::expert_stats,
        apporteur::list_apporteurs,
        apporteur::get_apporteur,
        apporteur::create_apporteur,
        apporteur::update_apporteur,
        apporteur::update_apporteur_status,
        apporteur::delete_apporteur,
        apporteur::apporteur_counts,
        apporteur::get_profile,
        apporteur::update_profile,
        apporteur::stats,
        apporteur::create_prospect,
        apporteur::list_prospects,
        apporteur::get_prospect,
        apporteur::update_prospect,
        apporteur::delete_prospect,
        apporteur::convert_prospect,
        apporteur::issue_credentials,
        produits::list_produits,
        produits::get_produit,
        produits::list_all_produits,
        produits::create_produit,
        produits::update_produit,
        produits::deactivate_produit,
        dossiers::list_dossiers,
        dossiers::get_dossier,
        dossiers::create_dossier,
        dossiers::update_dossier_status,
        dossiers::update_dossier_progress,
        dossiers::assign_expert,
        dossier_workflow::list_steps,
        dossier_workflow::update_step,
        dossier_workflow::get_timeline,
        dossier_workflow::add_timeline_event,
        dossier_workflow::delete_timeline_event,
        dossier_workflow::list_comments,
        dossier_workflow::add_comment,
        dossier_workflow::update_comment,
        dossier_workflow::delete_comment,
        simulator::create_session,
        simulator::questions,
        simulator::save_response,
        simulator::calculate_eligibility,
        simulator::results_by_id,
        simulator::results_by_token,
        simulator::abandon,
        simulator::migrate_session,
        simulator::migration_status,
        simulator::stats,
        simulator::run_for_self,
        simulator::run_on_behalf,
        rdv::list_rdvs,
        rdv::pending_validation,
        rdv::get_rdv,
        rdv::create_rdv,
        rdv::update_rdv,
        rdv::validate_rdv,
        rdv::respond_rdv,
        rdv::mark_completed,
        rdv::delete_rdv,
        notifications::create_notification,
        notifications::list_notifications,
        notifications::unread_count,
        notifications::mark_read,
        notifications::set_starred,
        notifications::archive,
        notifications::unarchive,
        notifications::mark_all_read,
        notifications::delete_all_read,
        notifications::delete_notification,
        notifications::get_preferences,
        notifications::update_preferences,
        documents::upload_document,
        documents::list_documents,
        documents::get_document,
        documents::download_document,
        documents::update_document,
        documents::validate_document,
        documents::delete_document,
        admin::dashboard,
    ),
    components(schemas(
        UserType, LoginRequest, TypedLoginRequest, LoginResponse, RegisterClientRequest,
        CheckSirenRequest, SirenAvailability, RefreshRequest, RefreshResponse,
        ChangePasswordRequest, AccountProfile, TokenInfo,
        Client, ClientDetail, CreateClientRequest, CreatedClient, UpdateClientProfileRequest,
        UpdateClientStatusRequest,
        Expert, ExpertPublic, CreateExpertRequest, UpdateExpertRequest, RejectExpertRequest,
        Apporteur, ApporteurStats, CreateApporteurRequest, UpdateApporteurRequest,
        UpdateApporteurStatusRequest, CreateProspectRequest, ProspectCredentials,
        ProduitEligible, CreateProduitRequest, UpdateProduitRequest,
        ClientProduitEligible, DossierView, CreateDossierRequest, UpdateDossierStatusRequest,
        UpdateDossierProgressRequest, AssignExpertRequest,
        DossierStep, UpdateStepRequest, DossierTimelineEvent, TimelinePage,
        CreateTimelineEventRequest, DossierComment, CreateCommentRequest, UpdateCommentRequest,
        SessionCreated, QuestionnaireQuestion, SaveResponseRequest, TemporaryResponse,
        SessionReferenceRequest, TemporaryEligibility, EligibilityResults, SimulatorStats,
        RunSimulationRequest, Simulation, SimulationOutcome, MigrateSessionRequest,
        MigrationDetails, MigrationResult, ProductCalculation, CalculationDetails,
        Rdv, RdvDetail, RdvProduitView, RdvProduitInput, CreateRdvRequest, UpdateRdvRequest,
        RdvAction, RdvResponseRequest, MarkCompletedRequest, CalendarEvent, RdvListing,
        Notification, NotificationPreferences, CreateNotificationRequest, StarRequest,
        UpdatePreferencesRequest,
        DocumentFile, UploadDocumentRequest, UpdateDocumentRequest, ValidateDocumentRequest,
        AdminDashboard, StatusCounts, PaginationMeta, AffectedCount,
        ClientStatut, ClientSource, ExpertStatus, ApprovalStatus, ApporteurStatus,
        DossierStatut, ProduitType, QuestionType, RdvStatus, MeetingType, RdvCategory,
        NotificationPriority, NotificationStatus, DocumentStatus, DocumentCategory,
        StepStatus, StepType, TimelineEventType, CommentCategory,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "Authentication", description = "Login per account type, client registration, tokens"),
        (name = "Clients", description = "Client self-service"),
        (name = "Experts", description = "Expert marketplace and expert self-service"),
        (name = "Apporteurs", description = "Business-referral partners and their prospects"),
        (name = "Produits", description = "Financial product catalog"),
        (name = "Dossiers", description = "Client eligibility and progress per product"),
        (name = "Dossier workflow", description = "Dossier steps, event timeline and internal comments"),
        (name = "Simulator", description = "Anonymous eligibility simulator and account migration"),
        (name = "RDV", description = "Appointments between clients, experts and apporteurs"),
        (name = "Notifications", description = "In-app notifications and preferences"),
        (name = "Documents", description = "Document upload and validation"),
        (name = "Admin", description = "Back-office management"),
        (name = "Health", description = "Service health checks")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Access token returned by the login endpoints"))
                        .build(),
                ),
            );
        }
    }
}

/// Complete document with the server list for the current environment
pub fn build_openapi_spec(config: &AppConfig) -> utoipa::openapi::OpenApi {
    let mut spec = ApiDoc::openapi();

    // Paths are declared with their /api prefix
    let server_url = match config.environment {
        crate::app_config::Environment::Production | crate::app_config::Environment::Staging => {
            "/".to_string()
        },
        _ => format!("http://localhost:{}/", config.server.api_port),
    };
    spec.servers = Some(vec![Server::new(server_url)]);
    spec
}

/// GET /api/docs/openapi.json
pub async fn serve_openapi_spec(State(app_state): State<AppState>) -> Response {
    let spec = build_openapi_spec(app_state.config.as_ref());

    match spec.to_json() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to serialize OpenAPI document: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        },
    }
}

/// Redirect /docs/ to /docs so the page's absolute spec URL keeps working
pub async fn redirect_to_docs(original_uri: OriginalUri) -> impl IntoResponse {
    let path = original_uri.0.path().trim_end_matches('/').to_string();
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, path)]).into_response()
}

pub use swagger_ui::serve_swagger_ui;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_lists_resources() {
        let spec = ApiDoc::openapi();
        let paths = &spec.paths.paths;
        assert!(paths.contains_key("/api/auth/login"));
        assert!(paths.contains_key("/api/simulator/migrate/{session_token}"));
        assert!(paths.contains_key("/api/rdv/{id}/validate"));
        assert!(paths.contains_key("/api/admin/dashboard"));

        let components = spec.components.expect("components");
        assert!(components.security_schemes.contains_key("bearerAuth"));
        assert!(components.schemas.contains_key("LoginResponse"));
    }
}
