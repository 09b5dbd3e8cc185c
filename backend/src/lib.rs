//! HF/VHF propagation report service
//!
//! Collects space-weather data from four public feeds, has a language model
//! write the narrative, renders an HTML report with interactive charts and
//! stores the bundle on local disk or in a cloud bucket.

use std::sync::Arc;

use axum::Router;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod external;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod storage;

pub use config::{Config, Deployment};

use crate::error::{AppError, AppResult};
use crate::external::{OpenAiClient, SourceHttpClient};
use crate::services::{
    DisabledAnimation, FetchCoordinator, LlmNarrator, ReportService, ReportSource, SunAnimator,
};
use crate::storage::{FileStorage, GcsStorage, LocalStorage};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<dyn FileStorage>,
    pub reports: Arc<ReportService>,
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::app_routes(&state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

/// Storage back-end for the deployment
pub fn build_storage(config: &Config, deployment: Deployment) -> AppResult<Arc<dyn FileStorage>> {
    match deployment {
        Deployment::Local => {
            tracing::info!(root = %config.storage.local_root, "Using local storage");
            Ok(Arc::new(LocalStorage::new(&config.storage.local_root)))
        }
        Deployment::Gcs => {
            let bucket = config.storage.gcs_bucket.clone().ok_or_else(|| {
                AppError::Configuration("GCS_BUCKET is required for the gcs deployment".to_string())
            })?;
            tracing::info!(%bucket, "Using object storage");
            Ok(Arc::new(GcsStorage::new(
                bucket,
                config.storage.gcp_project_id.clone(),
            )))
        }
    }
}

/// Report pipeline wired to the configured sources, model and storage
pub fn build_report_service(config: &Config, storage: Arc<dyn FileStorage>) -> AppResult<ReportService> {
    if config.mockup_mode {
        tracing::warn!("MOCKUP_MODE is on: reports use the built-in sample dataset");
        return ReportService::new(storage, ReportSource::Mock, Arc::new(DisabledAnimation));
    }

    let coordinator = FetchCoordinator::from_sources(&config.sources, SourceHttpClient::default());
    let client = OpenAiClient::with_base_url(
        config.llm.api_key.clone(),
        config.llm.model.clone(),
        config.llm.base_url.clone(),
    );
    let narrator = LlmNarrator::new(client, config.llm.system_prompt_path.clone());

    ReportService::new(
        storage,
        ReportSource::Live {
            coordinator,
            narrator: Arc::new(narrator),
        },
        Arc::new(SunAnimator::new()),
    )
}
