//! Report generation and listing handlers

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::AppResult;
use crate::services::SourceFailure;
use crate::AppState;

pub const DEFAULT_REPORT_LIMIT: usize = 10;
pub const MAX_REPORT_LIMIT: usize = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub status: String,
    #[serde(rename = "reportURL")]
    pub report_url: String,
    pub timestamp: DateTime<Utc>,
    pub folder_path: String,
    pub data_points: usize,
    pub failed_sources: Vec<SourceFailure>,
}

/// Run one generation.
///
/// Requests arriving while a run is in progress wait for it to finish and
/// then produce their own report. Dropping the connection cancels the run.
pub async fn generate_report(State(state): State<AppState>) -> AppResult<Json<GenerateResponse>> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let report = state.reports.generate(&cancel).await?;

    Ok(Json(GenerateResponse {
        status: "success".to_string(),
        report_url: report.report_url,
        timestamp: report.timestamp,
        folder_path: report.folder_path,
        data_points: report.data_points,
        failed_sources: report.failures,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ReportListQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ReportListResponse {
    pub reports: Vec<String>,
    pub count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Requested limit, defaulted and clamped to 1..=100
pub fn effective_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_REPORT_LIMIT)
        .clamp(1, MAX_REPORT_LIMIT)
}

/// Most recent report folders, newest first
pub async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ReportListQuery>,
) -> AppResult<Json<ReportListResponse>> {
    let reports = state.reports.list_reports(effective_limit(query.limit)).await?;

    Ok(Json(ReportListResponse {
        count: reports.len(),
        reports,
        timestamp: Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_defaults_and_clamps() {
        assert_eq!(effective_limit(None), 10);
        assert_eq!(effective_limit(Some(0)), 1);
        assert_eq!(effective_limit(Some(25)), 25);
        assert_eq!(effective_limit(Some(1000)), 100);
    }
}
