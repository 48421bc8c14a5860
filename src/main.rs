use std::net::SocketAddr;

use anyhow::Context;
use axum::middleware;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use profitum_backend::{
    api_router, initialize_app_state, middleware::dynamic_cors_middleware,
    services::initialize_background_tasks,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "profitum_backend=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = initialize_app_state()
        .await
        .map_err(|e| anyhow::anyhow!("Application startup failed: {}", e))?;

    initialize_background_tasks(&state);

    let bind_address = state.config.bind_address.clone();
    info!(
        environment = %state.config.environment,
        "Starting Profitum backend on {}", bind_address
    );
    if state.config.is_development() {
        info!("Development mode: wildcard CORS reflects the request origin");
    }
    if state.config.features.enable_swagger_ui {
        info!("API documentation available at /api/docs");
    }

    let app = api_router(state)
        .layer(middleware::from_fn(dynamic_cors_middleware))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
