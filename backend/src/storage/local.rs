//! Local directory back-end
//!
//! Keys map onto paths below a fixed root. Writes go through a temporary file
//! in the target directory and are renamed into place, so a reader never
//! observes a half-written key.

use std::{
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use walkdir::WalkDir;

use super::{normalize_key, normalize_prefix, FileStorage};
use crate::error::StorageError;

/// Storage rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<(String, PathBuf), StorageError> {
        let key = normalize_key(key)?;
        let path = key.split('/').fold(self.root.clone(), |path, part| path.join(part));
        Ok((key, path))
    }
}

fn write_atomically(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(ErrorKind::InvalidInput, "key has no parent directory")
    })?;
    std::fs::create_dir_all(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Forward-slash key for a path below `root`
fn key_for(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[async_trait]
impl FileStorage for LocalStorage {
    async fn store(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let (key, path) = self.path_for(key)?;
        let write_key = key.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, &data))
            .await
            .map_err(|e| StorageError::Backend(format!("write task failed: {}", e)))?
            .map_err(|e| StorageError::Write {
                key: write_key,
                message: e.to_string(),
            })?;

        tracing::debug!(key = %key, "Stored local file");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let (key, path) = self.path_for(key)?;

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(StorageError::NotFound(key)),
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StorageError::NotFound(key)),
            Err(e) => {
                return Err(StorageError::Read {
                    key,
                    message: e.to_string(),
                })
            }
        }

        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(key.clone()),
            _ => StorageError::Read {
                key: key.clone(),
                message: e.to_string(),
            },
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let (key, path) = self.path_for(key)?;
        // Directories are not objects
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Read {
                key,
                message: e.to_string(),
            }),
        }
    }

    async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>, StorageError> {
        let prefix = normalize_prefix(prefix)?;
        let root = self.root.clone();
        let start = if prefix.is_empty() {
            root.clone()
        } else {
            prefix.split('/').fold(root.clone(), |path, part| path.join(part))
        };

        let keys = tokio::task::spawn_blocking(move || -> Result<Vec<String>, StorageError> {
            if !start.is_dir() {
                return Ok(Vec::new());
            }

            let max_depth = if recursive { usize::MAX } else { 1 };
            let mut keys = Vec::new();
            for entry in WalkDir::new(&start).min_depth(1).max_depth(max_depth) {
                let entry = entry.map_err(|e| StorageError::Read {
                    key: prefix.clone(),
                    message: e.to_string(),
                })?;
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                let Some(key) = key_for(&root, entry.path()) else {
                    continue;
                };
                if entry.file_type().is_dir() {
                    if !recursive {
                        keys.push(format!("{}/", key));
                    }
                } else {
                    keys.push(key);
                }
            }
            Ok(keys)
        })
        .await
        .map_err(|e| StorageError::Backend(format!("list task failed: {}", e)))??;

        let mut keys = keys;
        keys.sort();
        Ok(keys)
    }

    async fn create_dir(&self, key: &str) -> Result<(), StorageError> {
        let (key, path) = self.path_for(key)?;
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| StorageError::Write {
                key,
                message: e.to_string(),
            })
    }

    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
