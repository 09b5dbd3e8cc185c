//! Cloud object-bucket back-end
//!
//! Talks to the Cloud Storage JSON API directly. Access tokens come from the
//! instance metadata server and are cached until shortly before expiry; a
//! static token can be supplied instead (emulators, tests).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{content_type_for, normalize_key, normalize_prefix, FileStorage};
use crate::error::StorageError;

const DEFAULT_API_URL: &str = "https://storage.googleapis.com";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const CACHE_CONTROL: &str = "public, max-age=3600";
/// Refresh tokens this long before they expire
const TOKEN_SLACK: Duration = Duration::from_secs(60);

/// Where bearer tokens come from
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// GCE/Cloud Run metadata server
    Metadata,
    /// Fixed token; `None` sends unauthenticated requests
    Static(Option<String>),
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Storage backed by a Cloud Storage bucket
pub struct GcsStorage {
    client: Client,
    bucket: String,
    project_id: Option<String>,
    base_url: String,
    token_source: TokenSource,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectItem>,
    #[serde(default)]
    prefixes: Vec<String>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectItem {
    name: String,
}

impl GcsStorage {
    /// Create a client for `bucket` using metadata-server credentials
    pub fn new(bucket: String, project_id: Option<String>) -> Self {
        Self::with_base_url(bucket, project_id, DEFAULT_API_URL.to_string(), TokenSource::Metadata)
    }

    /// Create a client with custom API base URL and credentials (for testing)
    pub fn with_base_url(
        bucket: String,
        project_id: Option<String>,
        base_url: String,
        token_source: TokenSource,
    ) -> Self {
        Self {
            client: Client::new(),
            bucket,
            project_id,
            base_url: base_url.trim_end_matches('/').to_string(),
            token_source,
            token: Mutex::new(None),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base_url,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(key)
        )
    }

    async fn bearer_token(&self) -> Result<Option<String>, StorageError> {
        match &self.token_source {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Metadata => {
                let mut cached = self.token.lock().await;
                if let Some(token) = cached.as_ref() {
                    if token.expires_at > Instant::now() + TOKEN_SLACK {
                        return Ok(Some(token.value.clone()));
                    }
                }

                let response = self
                    .client
                    .get(METADATA_TOKEN_URL)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|e| StorageError::Backend(format!("metadata token request failed: {}", e)))?;

                if !response.status().is_success() {
                    return Err(StorageError::Backend(format!(
                        "metadata token request returned {}",
                        response.status()
                    )));
                }

                let token: MetadataToken = response
                    .json()
                    .await
                    .map_err(|e| StorageError::Backend(format!("invalid metadata token: {}", e)))?;

                let value = token.access_token.clone();
                *cached = Some(CachedToken {
                    value: token.access_token,
                    expires_at: Instant::now() + Duration::from_secs(token.expires_in),
                });
                Ok(Some(value))
            }
        }
    }

    async fn authorized(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, StorageError> {
        let mut request = request;
        if let Some(token) = self.bearer_token().await? {
            request = request.bearer_auth(token);
        }
        if let Some(project) = &self.project_id {
            request = request.header("x-goog-user-project", project);
        }
        Ok(request)
    }

    async fn list_page(
        &self,
        prefix: &str,
        recursive: bool,
        page_token: Option<&str>,
    ) -> Result<ObjectList, StorageError> {
        let url = format!(
            "{}/storage/v1/b/{}/o",
            self.base_url,
            urlencoding::encode(&self.bucket)
        );
        let mut query: Vec<(&str, &str)> = vec![
            ("prefix", prefix),
            ("fields", "items(name),prefixes,nextPageToken"),
        ];
        if !recursive {
            query.push(("delimiter", "/"));
        }
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response = self
            .authorized(self.client.get(&url).query(&query))
            .await?
            .send()
            .await
            .map_err(|e| StorageError::Read {
                key: prefix.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(StorageError::Read {
                key: prefix.to_string(),
                message: format!("list returned {}", response.status()),
            });
        }

        response.json().await.map_err(|e| StorageError::Read {
            key: prefix.to_string(),
            message: format!("invalid list response: {}", e),
        })
    }
}

#[async_trait]
impl FileStorage for GcsStorage {
    async fn store(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let key = normalize_key(key)?;
        let content_type = content_type_for(&key);
        let metadata = serde_json::json!({
            "name": key,
            "contentType": content_type,
            "cacheControl": CACHE_CONTROL,
        });

        let boundary = format!("report-{}", uuid::Uuid::new_v4().simple());
        let mut body = Vec::with_capacity(data.len() + 512);
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n--{b}\r\nContent-Type: {ct}\r\n\r\n",
                b = boundary,
                meta = metadata,
                ct = content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(&data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let url = format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=multipart",
            self.base_url,
            urlencoding::encode(&self.bucket)
        );

        let response = self
            .authorized(
                self.client
                    .post(&url)
                    .header(
                        reqwest::header::CONTENT_TYPE,
                        format!("multipart/related; boundary={}", boundary),
                    )
                    .body(body),
            )
            .await?
            .send()
            .await
            .map_err(|e| StorageError::Write {
                key: key.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Write {
                key,
                message: format!("upload returned {}: {}", status, body),
            });
        }

        tracing::debug!(bucket = %self.bucket, key = %key, "Uploaded object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let key = normalize_key(key)?;
        let response = self
            .authorized(self.client.get(self.object_url(&key)).query(&[("alt", "media")]))
            .await?
            .send()
            .await
            .map_err(|e| StorageError::Read {
                key: key.clone(),
                message: e.to_string(),
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key));
        }
        if !response.status().is_success() {
            return Err(StorageError::Read {
                message: format!("download returned {}", response.status()),
                key,
            });
        }

        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|e| StorageError::Read {
                key,
                message: e.to_string(),
            })
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let key = normalize_key(key)?;
        let response = self
            .authorized(self.client.get(self.object_url(&key)).query(&[("fields", "name")]))
            .await?
            .send()
            .await
            .map_err(|e| StorageError::Read {
                key: key.clone(),
                message: e.to_string(),
            })?;

        match response.status() {
            status if status.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            status => Err(StorageError::Read {
                key,
                message: format!("metadata lookup returned {}", status),
            }),
        }
    }

    async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>, StorageError> {
        let prefix = normalize_prefix(prefix)?;
        let query_prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", prefix)
        };

        let mut keys = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .list_page(&query_prefix, recursive, page_token.as_deref())
                .await?;
            keys.extend(page.items.into_iter().map(|item| item.name));
            keys.extend(page.prefixes);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        // Folder placeholder objects share the prefix's name
        keys.retain(|key| key != &query_prefix && !key.is_empty());
        if recursive {
            keys.retain(|key| !key.ends_with('/'));
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn create_dir(&self, key: &str) -> Result<(), StorageError> {
        normalize_key(key).map(|_| ())
    }

    async fn close(&self) -> Result<(), StorageError> {
        *self.token.lock().await = None;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "gcs"
    }
}
