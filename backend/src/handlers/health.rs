//! Health check handler

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthChecks {
    pub storage: String,
    pub mode: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub checks: HealthChecks,
}

/// Always healthy while the process serves requests
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let mode = if state.reports.is_mock() { "mockup" } else { "live" };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        checks: HealthChecks {
            storage: state.storage.backend_name().to_string(),
            mode: mode.to_string(),
        },
    })
}
