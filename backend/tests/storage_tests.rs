//! Storage back-end contract tests
//!
//! The local, in-memory and object-bucket back-ends must agree on key
//! handling, overwrite semantics and listing, since the HTTP read side runs
//! against any of them. The bucket back-end talks to a small in-process fake
//! of the JSON API.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use propagation_report::{
    error::StorageError,
    storage::{FileStorage, GcsStorage, LocalStorage, MemoryStorage, TokenSource},
};

const FOLDER: &str = "2025/09/17/PropagationReport-2025-09-17-14-30-45";

async fn seed(storage: &dyn FileStorage) {
    for (name, body) in [
        ("index.html", "<html></html>"),
        ("normalized_data.json", "{}"),
        ("llm_response.md", "# Report"),
    ] {
        storage
            .store(&format!("{}/{}", FOLDER, name), body.as_bytes().to_vec())
            .await
            .unwrap();
    }
    storage
        .store("2025/09/18/PropagationReport-2025-09-18-00-00-01/index.html", b"<html></html>".to_vec())
        .await
        .unwrap();
}

async fn check_contract(storage: Arc<dyn FileStorage>) {
    seed(storage.as_ref()).await;

    // Round trip and overwrite
    assert_eq!(
        storage.get(&format!("{}/llm_response.md", FOLDER)).await.unwrap(),
        b"# Report"
    );
    storage
        .store(&format!("{}/llm_response.md", FOLDER), b"# Updated".to_vec())
        .await
        .unwrap();
    assert_eq!(
        storage.get(&format!("{}/llm_response.md", FOLDER)).await.unwrap(),
        b"# Updated"
    );

    // Leading and trailing slashes name the same key
    assert_eq!(
        storage.get(&format!("/{}/index.html", FOLDER)).await.unwrap(),
        b"<html></html>"
    );

    // Existence
    assert!(storage.exists(&format!("{}/index.html", FOLDER)).await.unwrap());
    assert!(!storage.exists(&format!("{}/missing.txt", FOLDER)).await.unwrap());
    // Folders are not objects
    assert!(!storage.exists(FOLDER).await.unwrap());
    assert!(!storage.exists("2025/09").await.unwrap());
    assert!(matches!(storage.get(FOLDER).await, Err(StorageError::NotFound(_))));

    // Missing keys and traversal
    assert!(matches!(
        storage.get(&format!("{}/missing.txt", FOLDER)).await,
        Err(StorageError::NotFound(_))
    ));
    assert!(matches!(
        storage.get("2025/../../etc/passwd").await,
        Err(StorageError::InvalidKey(_))
    ));
    assert!(matches!(
        storage.store("../outside.txt", b"x".to_vec()).await,
        Err(StorageError::InvalidKey(_))
    ));

    // Recursive listing returns files only, never the prefix
    let all = storage.list("2025/09/17", true).await.unwrap();
    assert_eq!(
        all,
        vec![
            format!("{}/index.html", FOLDER),
            format!("{}/llm_response.md", FOLDER),
            format!("{}/normalized_data.json", FOLDER),
        ]
    );

    // Shallow listing returns immediate children, directories with a slash
    assert_eq!(
        storage.list("2025/09", false).await.unwrap(),
        vec!["2025/09/17/".to_string(), "2025/09/18/".to_string()]
    );
    assert_eq!(storage.list("", false).await.unwrap(), vec!["2025/".to_string()]);

    // Unknown prefixes list as empty
    assert!(storage.list("1999", true).await.unwrap().is_empty());

    storage.close().await.unwrap();
}

#[tokio::test]
async fn test_memory_storage_contract() {
    check_contract(Arc::new(MemoryStorage::new())).await;
}

#[tokio::test]
async fn test_local_storage_contract() {
    let dir = tempfile::tempdir().unwrap();
    check_contract(Arc::new(LocalStorage::new(dir.path()))).await;
}

#[tokio::test]
async fn test_local_storage_writes_real_files() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());

    storage
        .store(&format!("{}/index.html", FOLDER), b"<html></html>".to_vec())
        .await
        .unwrap();

    let on_disk = dir.path().join(FOLDER).join("index.html");
    assert_eq!(std::fs::read(on_disk).unwrap(), b"<html></html>");
    assert_eq!(storage.backend_name(), "local");
}

#[tokio::test]
async fn test_local_storage_ignores_hidden_files() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    storage.store("reports/a.txt", b"a".to_vec()).await.unwrap();
    std::fs::write(dir.path().join("reports").join(".partial"), b"x").unwrap();

    assert_eq!(
        storage.list("reports", true).await.unwrap(),
        vec!["reports/a.txt".to_string()]
    );
}

// ============================================================================
// Fake bucket
// ============================================================================

/// Entries per list page, small enough that the contract listings page
const PAGE_SIZE: usize = 2;

#[derive(Debug, Clone)]
struct FakeObject {
    data: Vec<u8>,
    metadata: Value,
}

#[derive(Clone, Default)]
struct FakeBucket {
    objects: Arc<Mutex<BTreeMap<String, FakeObject>>>,
    list_calls: Arc<AtomicUsize>,
    /// (Authorization, x-goog-user-project) of each upload
    upload_headers: Arc<Mutex<Vec<(Option<String>, Option<String>)>>>,
}

impl FakeBucket {
    fn object(&self, name: &str) -> Option<FakeObject> {
        self.objects.lock().unwrap().get(name).cloned()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Split a two-part `multipart/related` upload into metadata and media
fn split_upload(body: &[u8], boundary: &str) -> (Value, Vec<u8>) {
    let closing = format!("\r\n--{}--\r\n", boundary);
    let separator = format!("\r\n--{}\r\n", boundary);
    let body = body.strip_suffix(closing.as_bytes()).expect("closing boundary");

    let metadata_start = find(body, b"\r\n\r\n").expect("metadata headers") + 4;
    let rest = &body[metadata_start..];
    let metadata_end = find(rest, separator.as_bytes()).expect("media part");
    let metadata = serde_json::from_slice(&rest[..metadata_end]).expect("metadata json");

    let media = &rest[metadata_end + separator.len()..];
    let media_start = find(media, b"\r\n\r\n").expect("media headers") + 4;
    (metadata, media[media_start..].to_vec())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

async fn upload(
    State(fake): State<FakeBucket>,
    Path(bucket): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if bucket == "broken" {
        return (StatusCode::SERVICE_UNAVAILABLE, "backend unavailable").into_response();
    }
    assert_eq!(params.get("uploadType").map(String::as_str), Some("multipart"));

    let content_type = header_value(&headers, header::CONTENT_TYPE.as_str()).unwrap_or_default();
    let boundary = content_type
        .strip_prefix("multipart/related; boundary=")
        .expect("multipart/related upload")
        .to_string();
    let (metadata, data) = split_upload(&body, &boundary);
    let name = metadata["name"].as_str().expect("object name").to_string();

    fake.upload_headers.lock().unwrap().push((
        header_value(&headers, header::AUTHORIZATION.as_str()),
        header_value(&headers, "x-goog-user-project"),
    ));
    fake.objects
        .lock()
        .unwrap()
        .insert(name.clone(), FakeObject { data, metadata });
    Json(json!({ "name": name, "bucket": bucket })).into_response()
}

async fn object(
    State(fake): State<FakeBucket>,
    Path((_bucket, name)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match fake.object(&name) {
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": { "code": 404, "message": "No such object" } })),
        )
            .into_response(),
        Some(found) if params.get("alt").map(String::as_str) == Some("media") => found.data.into_response(),
        Some(_) => Json(json!({ "name": name })).into_response(),
    }
}

/// Object listing with `prefix`, optional `/` delimiter and offset page tokens
async fn list_objects(
    State(fake): State<FakeBucket>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    fake.list_calls.fetch_add(1, Ordering::SeqCst);
    let prefix = params.get("prefix").cloned().unwrap_or_default();
    let delimited = params.get("delimiter").map(String::as_str) == Some("/");
    let offset: usize = params.get("pageToken").map(|t| t.parse().unwrap()).unwrap_or(0);

    // (entry, is_prefix) in name order
    let mut entries: BTreeSet<(String, bool)> = BTreeSet::new();
    for name in fake.objects.lock().unwrap().keys() {
        let Some(rest) = name.strip_prefix(&prefix) else {
            continue;
        };
        match rest.find('/') {
            Some(slash) if delimited => {
                entries.insert((format!("{}{}", prefix, &rest[..=slash]), true));
            }
            _ => {
                entries.insert((name.clone(), false));
            }
        }
    }

    let page: Vec<(String, bool)> = entries.iter().skip(offset).take(PAGE_SIZE).cloned().collect();
    let items: Vec<Value> = page
        .iter()
        .filter(|(_, is_prefix)| !is_prefix)
        .map(|(name, _)| json!({ "name": name }))
        .collect();
    let prefixes: Vec<&String> = page.iter().filter(|(_, is_prefix)| *is_prefix).map(|(p, _)| p).collect();

    let mut body = json!({ "kind": "storage#objects", "items": items, "prefixes": prefixes });
    if offset + PAGE_SIZE < entries.len() {
        body["nextPageToken"] = json!((offset + PAGE_SIZE).to_string());
    }
    Json(body)
}

async fn spawn_bucket() -> (SocketAddr, FakeBucket) {
    let fake = FakeBucket::default();
    let app = Router::new()
        .route("/upload/storage/v1/b/:bucket/o", post(upload))
        .route("/storage/v1/b/:bucket/o", get(list_objects))
        .route("/storage/v1/b/:bucket/o/:name", get(object))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, fake)
}

fn bucket_storage(addr: SocketAddr, bucket: &str) -> GcsStorage {
    GcsStorage::with_base_url(
        bucket.to_string(),
        None,
        format!("http://{}", addr),
        TokenSource::Static(None),
    )
}

// ============================================================================
// Object bucket
// ============================================================================

#[tokio::test]
async fn test_bucket_storage_contract() {
    let (addr, fake) = spawn_bucket().await;
    check_contract(Arc::new(bucket_storage(addr, "reports"))).await;

    // Listings of more than one page were followed to the end
    assert!(fake.list_calls.load(Ordering::SeqCst) > 4);
}

#[tokio::test]
async fn test_bucket_upload_sets_content_type_and_cache_control() {
    let (addr, fake) = spawn_bucket().await;
    let storage = bucket_storage(addr, "reports");

    storage
        .store(&format!("{}/index.html", FOLDER), b"<html></html>".to_vec())
        .await
        .unwrap();
    storage
        .store(&format!("/{}/sun_72h.gif", FOLDER), b"GIF89a".to_vec())
        .await
        .unwrap();

    let index = fake.object(&format!("{}/index.html", FOLDER)).unwrap();
    assert_eq!(index.data, b"<html></html>");
    assert_eq!(index.metadata["contentType"], "text/html");
    assert_eq!(index.metadata["cacheControl"], "public, max-age=3600");

    // Leading slash stripped before upload
    let gif = fake.object(&format!("{}/sun_72h.gif", FOLDER)).unwrap();
    assert_eq!(gif.data, b"GIF89a");
    assert_eq!(gif.metadata["contentType"], "image/gif");
    assert_eq!(storage.backend_name(), "gcs");
}

#[tokio::test]
async fn test_bucket_sends_token_and_billing_project() {
    let (addr, fake) = spawn_bucket().await;
    let storage = GcsStorage::with_base_url(
        "reports".to_string(),
        Some("ham-radio".to_string()),
        format!("http://{}", addr),
        TokenSource::Static(Some("static-token".to_string())),
    );
    storage.store("a/b.txt", b"x".to_vec()).await.unwrap();

    let anonymous = bucket_storage(addr, "reports");
    anonymous.store("a/c.txt", b"y".to_vec()).await.unwrap();

    let seen = fake.upload_headers.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            (Some("Bearer static-token".to_string()), Some("ham-radio".to_string())),
            (None, None),
        ]
    );
}

#[tokio::test]
async fn test_bucket_upload_failure_is_write_error() {
    let (addr, fake) = spawn_bucket().await;
    let storage = bucket_storage(addr, "broken");

    let err = storage.store("a/b.txt", b"x".to_vec()).await.unwrap_err();
    match err {
        StorageError::Write { key, message } => {
            assert_eq!(key, "a/b.txt");
            assert!(message.contains("503"), "{}", message);
        }
        other => panic!("expected write error, got {:?}", other),
    }
    assert!(fake.objects.lock().unwrap().is_empty());
}
