//! Read side: stored bundle files and the landing page

use axum::{
    extract::{Path, State},
    http::header,
    response::{Html, IntoResponse},
};

use crate::error::{AppError, AppResult};
use crate::services::report::INDEX_FILE;
use crate::storage::{content_type_for, has_parent_segment};
use crate::AppState;

const FALLBACK_LANDING: &str = "<!DOCTYPE html><html><head><title>HF Propagation Reports</title></head>\
<body><h1>HF Propagation Reports</h1><p>No report available.</p></body></html>";

/// Serve one file of a stored bundle
pub async fn serve_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> AppResult<impl IntoResponse> {
    if has_parent_segment(&path) {
        return Err(AppError::InvalidPath(path));
    }
    let key = path.trim_matches('/');
    if key.is_empty() {
        return Err(AppError::NotFound("File".to_string()));
    }

    let bytes = state.storage.get(key).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(key))], bytes))
}

/// Point relative URLs of a stored page at its bundle folder
pub fn inject_base_href(html: &str, folder: &str) -> String {
    let base = format!(r#"<base href="/files/{}/">"#, folder);
    match html.find("<head>") {
        Some(at) => {
            let insert_at = at + "<head>".len();
            format!("{}\n  {}{}", &html[..insert_at], base, &html[insert_at..])
        }
        None => format!("{}{}", base, html),
    }
}

async fn latest_page(state: &AppState) -> AppResult<Option<String>> {
    let Some(folder) = state.reports.latest_report().await? else {
        return Ok(None);
    };
    let bytes = state.storage.get(&format!("{}/{}", folder, INDEX_FILE)).await?;
    let html = String::from_utf8_lossy(&bytes);
    Ok(Some(inject_base_href(&html, &folder)))
}

/// Latest report, or the landing page when there is none
pub async fn index(State(state): State<AppState>) -> Html<String> {
    match latest_page(&state).await {
        Ok(Some(page)) => return Html(page),
        Ok(None) => tracing::debug!("No report yet, serving landing page"),
        Err(e) => tracing::warn!(error = %e, "Could not load latest report"),
    }

    let reports = state.reports.list_reports(10).await.unwrap_or_default();
    match state.reports.composer().landing_page(&reports) {
        Ok(page) => Html(page),
        Err(e) => {
            tracing::error!(error = %e, "Landing page render failed");
            Html(FALLBACK_LANDING.to_string())
        }
    }
}
