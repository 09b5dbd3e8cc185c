//! HTTP surface tests
//!
//! Drives the full router in-process against in-memory storage and the
//! built-in sample dataset:
//! - health, generate (auth, method), report listing
//! - file serving (content types, traversal, missing keys)
//! - landing page vs. latest report at `/`

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use propagation_report::{
    create_app,
    services::{DisabledAnimation, ReportService, ReportSource},
    storage::{FileStorage, MemoryStorage},
    AppState, Config,
};

// ============================================================================
// Helpers
// ============================================================================

fn test_config(api_key: Option<&str>) -> Config {
    let mut vars = HashMap::from([("MOCKUP_MODE".to_string(), "true".to_string())]);
    if let Some(key) = api_key {
        vars.insert("REPORT_API_KEY".to_string(), key.to_string());
    }
    Config::from_vars(vars).unwrap()
}

fn test_app(api_key: Option<&str>) -> (Router, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let reports = ReportService::new(storage.clone(), ReportSource::Mock, Arc::new(DisabledAnimation)).unwrap();
    let state = AppState {
        config: Arc::new(test_config(api_key)),
        storage: storage.clone(),
        reports: Arc::new(reports),
    };
    (create_app(state), storage)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_reports_mode_and_storage() {
    let (app, _) = test_app(None);
    let (status, body) = send_json(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["storage"], "memory");
    assert_eq!(body["checks"]["mode"], "mockup");
    assert!(body["version"].is_string());
}

// ============================================================================
// Generate
// ============================================================================

#[tokio::test]
async fn test_generate_writes_bundle_and_returns_url() {
    let (app, storage) = test_app(None);
    let (status, body) = send_json(&app, post("/generate")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let folder = body["folderPath"].as_str().unwrap().to_string();
    assert!(folder.contains("/PropagationReport-"));
    assert_eq!(body["reportURL"], format!("/files/{}/index.html", folder));
    assert!(body["dataPoints"].as_u64().unwrap() > 0);
    assert_eq!(body["failedSources"], Value::Array(vec![]));

    for name in ["index.html", "normalized_data.json", "llm_response.md"] {
        assert!(storage.exists(&format!("{}/{}", folder, name)).await.unwrap(), "{}", name);
    }
}

#[tokio::test]
async fn test_generate_requires_configured_key() {
    let (app, storage) = test_app(Some("s3cret"));

    let (status, body) = send_json(&app, post("/generate")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let wrong = Request::builder()
        .method(Method::POST)
        .uri("/generate")
        .header("X-API-Key", "nope")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send_json(&app, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(storage.keys().await.is_empty());

    let right = Request::builder()
        .method(Method::POST)
        .uri("/generate")
        .header("X-API-Key", "s3cret")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send_json(&app, right).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(&app, post("/generate?api_key=s3cret")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_concurrent_generations_queue() {
    let (app, storage) = test_app(None);

    let ((first_status, first), (second_status, second)) =
        tokio::join!(send_json(&app, post("/generate")), send_json(&app, post("/generate")));

    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(second_status, StatusCode::OK);
    assert_ne!(first["folderPath"], second["folderPath"]);

    let indexes = storage
        .keys()
        .await
        .into_iter()
        .filter(|key| key.ends_with("/index.html"))
        .count();
    assert_eq!(indexes, 2);
}

#[tokio::test]
async fn test_generate_rejects_get() {
    let (app, _) = test_app(None);
    let (status, _, _) = send(&app, get("/generate")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

// ============================================================================
// Report listing
// ============================================================================

#[tokio::test]
async fn test_reports_listed_newest_first() {
    let (app, _) = test_app(None);

    let (status, body) = send_json(&app, get("/reports")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    let (_, first) = send_json(&app, post("/generate")).await;
    let (_, second) = send_json(&app, post("/generate")).await;

    let (_, body) = send_json(&app, get("/reports")).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["reports"][0], second["folderPath"]);
    assert_eq!(body["reports"][1], first["folderPath"]);

    let (_, body) = send_json(&app, get("/reports?limit=1")).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["reports"][0], second["folderPath"]);
}

// ============================================================================
// File serving
// ============================================================================

#[tokio::test]
async fn test_files_served_with_content_type() {
    let (app, storage) = test_app(None);
    storage
        .store("2025/09/17/PropagationReport-2025-09-17-14-30-45/normalized_data.json", b"{}".to_vec())
        .await
        .unwrap();
    storage
        .store("2025/09/17/PropagationReport-2025-09-17-14-30-45/sun_72h.gif", vec![0x47, 0x49, 0x46])
        .await
        .unwrap();

    let (status, content_type, body) = send(
        &app,
        get("/files/2025/09/17/PropagationReport-2025-09-17-14-30-45/normalized_data.json"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(body, b"{}");

    let (status, content_type, _) = send(
        &app,
        get("/files/2025/09/17/PropagationReport-2025-09-17-14-30-45/sun_72h.gif"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/gif"));
}

#[tokio::test]
async fn test_files_reject_parent_segments() {
    let (app, _) = test_app(None);
    let (status, body) = send_json(&app, get("/files/2025/../../etc/passwd")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_PATH");
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let (app, _) = test_app(None);
    let (status, body) = send_json(&app, get("/files/2025/01/01/nothing.html")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

// ============================================================================
// Index
// ============================================================================

#[tokio::test]
async fn test_index_shows_landing_page_without_reports() {
    let (app, _) = test_app(None);
    let (status, content_type, body) = send(&app, get("/")).await;
    let html = String::from_utf8(body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/html"));
    assert!(html.contains("No report has been generated yet"));
}

#[tokio::test]
async fn test_index_serves_latest_report_with_base_href() {
    let (app, _) = test_app(None);
    let (_, generated) = send_json(&app, post("/generate")).await;
    let folder = generated["folderPath"].as_str().unwrap();

    let (status, _, body) = send(&app, get("/")).await;
    let html = String::from_utf8(body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains(&format!(r#"<base href="/files/{}/">"#, folder)));
    assert!(html.contains("HF Propagation Report"));
    assert!(html.contains("echarts.init"));
}
