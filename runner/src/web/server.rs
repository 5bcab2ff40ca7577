use crate::web::{handlers, AppState};
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub async fn start_web_server(state: AppState, shutdown: CancellationToken) -> Result<()> {
    let app = create_router(state.clone());
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // === SCHEDULER ROUTES ===
        .route("/api/cron/start", post(handlers::start_engine))
        .route("/api/cron/stop", post(handlers::stop_engine))
        .route("/api/cron/status", get(handlers::engine_status))
        .route("/api/cron/reload", post(handlers::reload_engine))
        // === JOB ROUTES ===
        .route(
            "/api/cron/jobs",
            get(handlers::list_jobs).post(handlers::save_job),
        )
        .route("/api/cron/jobs/{id}/pause", post(handlers::pause_job))
        .route("/api/cron/jobs/{id}/resume", post(handlers::resume_job))
        .route("/api/cron/jobs/{id}/logs", get(handlers::recent_job_logs))
        .route(
            "/api/cron/job/{id}/run/stream",
            get(handlers::run_job_stream),
        )
        // === EXECUTION LOG ROUTES ===
        .route(
            "/api/cron/logs/today-failures",
            get(handlers::today_failures),
        )
        .route("/api/cron/logs/{id}", get(handlers::get_log))
        .route(
            "/api/cron/logs/{id}/mail-preview",
            get(handlers::mail_preview),
        )
        // === CONNECTION TEST ROUTES ===
        .route(
            "/api/servers/{id}/test/stream",
            get(handlers::test_server_stream),
        )
        .route(
            "/api/databases/{id}/test/stream",
            get(handlers::test_database_stream),
        )
        // Add middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
