//! Route definitions for the API server

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Creates the main application router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        // Single ratings
        .route("/ratings/c1", get(handlers::get_c1))
        .route("/ratings/c2", get(handlers::get_c2))
        .route("/ratings/c3", get(handlers::get_c3))
        .route("/ratings/combined", get(handlers::get_combined))
        .route("/ratings/:rating/last-update", get(handlers::get_last_update))
        // Watchlist token resolution
        .route("/instruments/:token", get(handlers::get_instrument))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
