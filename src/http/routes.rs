use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Interview lifecycle
        .route("/interview/:code/join", post(handlers::join_interview))
        .route("/interview/start", post(handlers::start_interview))
        .route("/interview/stop", post(handlers::stop_interview))
        // Attempt queries
        .route("/interview/status", get(handlers::interview_status))
        .route("/interview/transcript", get(handlers::interview_transcript))
        // Request logging, and CORS for the browser join page
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
