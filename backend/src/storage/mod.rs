//! File storage abstraction
//!
//! A key-value view of a directory tree. Keys are forward-slash paths with no
//! leading slash; "directories" are key prefixes. The same interface backs
//! report writes and the read side of the HTTP surface.

mod gcs;
mod local;
mod memory;

pub use gcs::{GcsStorage, TokenSource};
pub use local::LocalStorage;
pub use memory::MemoryStorage;

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::StorageError;

/// Uniform storage interface shared by every back-end
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Write `data` under `key`, creating parents and overwriting any existing value
    async fn store(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError>;

    /// Read the bytes stored under `key`
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Keys under the `prefix` directory.
    ///
    /// Recursive listings return every stored key below the prefix.
    /// Non-recursive listings return immediate children, with sub-directories
    /// suffixed by `/`. The prefix itself is never returned.
    async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>, StorageError>;

    async fn create_dir(&self, key: &str) -> Result<(), StorageError>;

    async fn close(&self) -> Result<(), StorageError>;

    /// Short name reported by the health endpoint
    fn backend_name(&self) -> &'static str;
}

/// Content type for a key, derived from its extension
pub fn content_type_for(key: &str) -> &'static str {
    let extension = key
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("html") => "text/html",
        Some("png") => "image/png",
        Some("json") => "application/json",
        Some("css") => "text/css",
        Some("gif") => "image/gif",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("md") => "text/markdown",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Whether a path contains a `..` segment
pub fn has_parent_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| segment == "..")
}

/// Normalise a key: strip surrounding slashes, reject `..` and empty keys
pub(crate) fn normalize_key(key: &str) -> Result<String, StorageError> {
    let trimmed = key.trim_matches('/');
    if trimmed.is_empty() {
        return Err(StorageError::InvalidKey("empty key".to_string()));
    }
    if has_parent_segment(trimmed) {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Normalise a listing prefix; the empty prefix is the root
pub(crate) fn normalize_prefix(prefix: &str) -> Result<String, StorageError> {
    let trimmed = prefix.trim_matches('/');
    if has_parent_segment(trimmed) {
        return Err(StorageError::InvalidKey(prefix.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Apply listing semantics to a flat set of stored keys
pub(crate) fn list_keys<'a>(
    keys: impl Iterator<Item = &'a str>,
    prefix: &str,
    recursive: bool,
) -> Vec<String> {
    let base = if prefix.is_empty() {
        String::new()
    } else {
        format!("{}/", prefix)
    };

    let mut result = BTreeSet::new();
    for key in keys {
        let Some(rest) = key.strip_prefix(base.as_str()) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        let entry = if recursive {
            key.to_string()
        } else {
            match rest.split_once('/') {
                Some((child, _)) => format!("{}{}/", base, child),
                None => key.to_string(),
            }
        };
        result.insert(entry);
    }
    result.into_iter().collect()
}
