use super::handlers;
use super::state::AppState;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let ws_path = state.config.ws_path.clone();

    Router::new()
        // Streaming endpoint
        .route(&ws_path, get(handlers::stream_socket))
        // Diagnostics
        .route("/health", get(handlers::health_check))
        .route("/sessions", get(handlers::list_sessions))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
