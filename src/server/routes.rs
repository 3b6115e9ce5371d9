//! Router configuration for the web server.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        // Run control
        .route("/start_scraping", post(handlers::start_scraping))
        .route("/progress", get(handlers::progress))
        .route("/cancel_scraping", post(handlers::cancel_scraping))
        .route("/results", get(handlers::results))
        // Exports
        .route("/download/:filename", get(handlers::download_file))
        .route("/download_all", get(handlers::download_all))
        .route("/api/validate_session", post(handlers::validate_session))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
