// HTTP handlers and route tables. Everything is served under /api.

pub mod admin;
pub mod apporteur;
pub mod auth;
pub mod client;
pub mod docs;
pub mod documents;
pub mod dossier_workflow;
pub mod dossiers;
pub mod experts;
pub mod health;
pub mod notifications;
pub mod produits;
pub mod rdv;
pub mod simulator;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{
    app::AppState,
    middleware::{
        auth::{require_admin, require_apporteur, require_client, require_expert},
        auth_middleware,
    },
    services::document::upload_body_limit,
};

// Login, registration and token refresh
pub fn public_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/{user_type}/login", post(auth::login_typed))
        .route("/register", post(auth::register))
        .route("/check-siren", post(auth::check_siren))
        .route("/refresh", post(auth::refresh))
}

pub fn protected_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(auth::me))
        .route("/verify", get(auth::verify))
        .route("/password", put(auth::change_password))
}

// Anonymous simulator; stats are admin-only and live in protected_routes
pub fn simulator_routes() -> Router<AppState> {
    Router::new()
        .route("/session", post(simulator::create_session))
        .route("/questions", get(simulator::questions))
        .route("/response", post(simulator::save_response))
        .route(
            "/calculate-eligibility",
            post(simulator::calculate_eligibility),
        )
        .route("/results/{session_id}", get(simulator::results_by_id))
        .route("/results/session/{token}", get(simulator::results_by_token))
        .route("/abandon", post(simulator::abandon))
        .route("/migrate/{session_token}", post(simulator::migrate_session))
        .route(
            "/migrate/{session_token}/status",
            get(simulator::migration_status),
        )
}

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/docs/openapi.json", get(docs::serve_openapi_spec))
        .route("/experts", get(experts::marketplace))
        .route("/experts/{id}", get(experts::marketplace_get))
        .route("/produits", get(produits::list_produits))
        .route("/produits/{id}", get(produits::get_produit))
        .nest("/auth", public_auth_routes())
        .nest("/simulator", simulator_routes())
}

pub fn client_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/client/profile",
            get(client::get_profile).put(client::update_profile),
        )
        .route("/simulations", post(simulator::run_for_self))
        .route_layer(middleware::from_fn(require_client))
}

pub fn expert_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/expert/profile",
            get(experts::get_profile).put(experts::update_profile),
        )
        .route("/expert/dossiers", get(experts::assigned_dossiers))
        .route("/rdv/pending/validation", get(rdv::pending_validation))
        .route("/rdv/{id}/validate", put(rdv::validate_rdv))
        .route_layer(middleware::from_fn(require_expert))
}

pub fn apporteur_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(apporteur::get_profile).put(apporteur::update_profile),
        )
        .route("/stats", get(apporteur::stats))
        .route(
            "/prospects",
            post(apporteur::create_prospect).get(apporteur::list_prospects),
        )
        .route(
            "/prospects/{id}",
            get(apporteur::get_prospect)
                .put(apporteur::update_prospect)
                .delete(apporteur::delete_prospect),
        )
        .route("/prospects/{id}/convert", post(apporteur::convert_prospect))
        .route(
            "/prospects/{id}/credentials",
            post(apporteur::issue_credentials),
        )
        .route_layer(middleware::from_fn(require_apporteur))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route(
            "/clients",
            get(client::list_clients).post(client::create_client),
        )
        .route("/clients/stats", get(client::client_stats))
        .route(
            "/clients/{id}",
            get(client::get_client).delete(client::delete_client),
        )
        .route("/clients/{id}/status", put(client::update_client_status))
        .route("/clients/{id}/simulation", post(simulator::run_on_behalf))
        .route(
            "/experts",
            get(experts::list_experts).post(experts::create_expert),
        )
        .route("/experts/stats", get(experts::expert_stats))
        .route(
            "/experts/{id}",
            get(experts::get_expert)
                .put(experts::update_expert)
                .delete(experts::delete_expert),
        )
        .route("/experts/{id}/approve", put(experts::approve_expert))
        .route("/experts/{id}/reject", put(experts::reject_expert))
        .route("/experts/{id}/suspend", put(experts::suspend_expert))
        .route("/experts/{id}/reactivate", put(experts::reactivate_expert))
        .route(
            "/apporteurs",
            get(apporteur::list_apporteurs).post(apporteur::create_apporteur),
        )
        .route("/apporteurs/stats", get(apporteur::apporteur_counts))
        .route(
            "/apporteurs/{id}",
            get(apporteur::get_apporteur)
                .put(apporteur::update_apporteur)
                .delete(apporteur::delete_apporteur),
        )
        .route(
            "/apporteurs/{id}/status",
            put(apporteur::update_apporteur_status),
        )
        .route(
            "/produits",
            get(produits::list_all_produits).post(produits::create_produit),
        )
        .route(
            "/produits/{id}",
            put(produits::update_produit).delete(produits::deactivate_produit),
        )
        .route_layer(middleware::from_fn(require_admin))
}

// Any authenticated account; per-role rules live in the services
pub fn shared_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/dossiers",
            get(dossiers::list_dossiers).post(dossiers::create_dossier),
        )
        .route("/dossiers/{id}", get(dossiers::get_dossier))
        .route(
            "/dossiers/{id}/status",
            put(dossiers::update_dossier_status),
        )
        .route(
            "/dossiers/{id}/progress",
            put(dossiers::update_dossier_progress),
        )
        .route("/dossiers/{id}/assign-expert", put(dossiers::assign_expert))
        .route("/dossiers/{id}/steps", get(dossier_workflow::list_steps))
        .route(
            "/dossiers/{id}/steps/{step_id}",
            put(dossier_workflow::update_step),
        )
        .route(
            "/dossiers/{id}/timeline",
            get(dossier_workflow::get_timeline).post(dossier_workflow::add_timeline_event),
        )
        .route(
            "/dossiers/{id}/timeline/{event_id}",
            axum::routing::delete(dossier_workflow::delete_timeline_event),
        )
        .route(
            "/dossiers/{id}/comments",
            get(dossier_workflow::list_comments).post(dossier_workflow::add_comment),
        )
        .route(
            "/dossiers/{id}/comments/{comment_id}",
            put(dossier_workflow::update_comment).delete(dossier_workflow::delete_comment),
        )
        .route("/rdv", get(rdv::list_rdvs).post(rdv::create_rdv))
        .route(
            "/rdv/{id}",
            get(rdv::get_rdv)
                .put(rdv::update_rdv)
                .delete(rdv::delete_rdv),
        )
        .route("/rdv/{id}/respond", put(rdv::respond_rdv))
        .route("/rdv/{id}/mark-completed", post(rdv::mark_completed))
        .route(
            "/notifications",
            get(notifications::list_notifications).post(notifications::create_notification),
        )
        .route(
            "/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route(
            "/notifications/mark-all-read",
            put(notifications::mark_all_read),
        )
        .route(
            "/notifications/delete-all-read",
            axum::routing::delete(notifications::delete_all_read),
        )
        .route(
            "/notifications/preferences",
            get(notifications::get_preferences).put(notifications::update_preferences),
        )
        .route(
            "/notifications/{id}",
            axum::routing::delete(notifications::delete_notification),
        )
        .route("/notifications/{id}/read", put(notifications::mark_read))
        .route("/notifications/{id}/star", put(notifications::set_starred))
        .route("/notifications/{id}/archive", put(notifications::archive))
        .route(
            "/notifications/{id}/unarchive",
            put(notifications::unarchive),
        )
        .route(
            "/documents",
            get(documents::list_documents).post(documents::upload_document).layer(
                DefaultBodyLimit::max(upload_body_limit(max_upload_bytes)),
            ),
        )
        .route(
            "/documents/{id}",
            get(documents::get_document)
                .put(documents::update_document)
                .delete(documents::delete_document),
        )
        .route(
            "/documents/{id}/download",
            get(documents::download_document),
        )
        .route(
            "/documents/{id}/validate",
            put(documents::validate_document),
        )
}

/// Every route behind the JWT middleware, role groups included
pub fn protected_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", protected_auth_routes())
        .merge(client_routes())
        .merge(expert_routes())
        .nest("/apporteur", apporteur_routes())
        .nest("/admin", admin_routes())
        .route(
            "/simulator/stats",
            get(simulator::stats).route_layer(middleware::from_fn(require_admin)),
        )
        .merge(shared_routes(state.config.storage.max_upload_bytes))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
}

/// The `/api` tree with state applied
pub fn api_router(state: AppState) -> Router {
    let mut api = public_routes().merge(protected_routes(&state));

    if state.config.features.enable_swagger_ui {
        api = api
            .route("/docs", get(docs::serve_swagger_ui))
            .route("/docs/", get(docs::redirect_to_docs));
    }

    Router::new().nest("/api", api).with_state(state)
}
