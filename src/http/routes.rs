use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Walk control
        .route("/walks/start", post(handlers::start_walk))
        .route("/walks/:walk_id/fixes", post(handlers::submit_fix))
        .route("/walks/:walk_id/stop", post(handlers::stop_walk))
        .route("/walks/:walk_id/status", get(handlers::get_walk_status))
        // Walk log
        .route("/walks/log", get(handlers::get_walk_log))
        .route("/walks/log/:date/:entry_id", delete(handlers::delete_walk_log_entry))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
