//! Route definitions for the propagation report service

use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{services::ServeDir, timeout::TimeoutLayer};

use crate::{handlers, middleware::require_api_key, AppState};

/// All routes
pub fn app_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // Public read routes
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        .route("/reports", get(handlers::list_reports))
        .route("/files/*path", get(handlers::serve_file))
        // Protected write route
        .merge(generate_routes(state))
        // Stylesheet and images referenced by report pages
        .nest_service("/static", ServeDir::new(&state.config.server.static_dir))
}

/// `/generate`, behind the API key and a long write timeout
fn generate_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/generate", post(handlers::generate_report))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.server.generate_timeout_secs,
        )))
}
