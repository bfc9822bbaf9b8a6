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
        .route("/status", get(handlers::get_status))
        // Conversation control
        .route("/activate", post(handlers::activate))
        .route("/detectors/start", post(handlers::start_detectors))
        .route("/detectors/stop", post(handlers::stop_detectors))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        // The dashboard is served from another origin
        .layer(CorsLayer::permissive())
        .with_state(state)
}
