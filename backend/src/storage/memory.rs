//! In-memory back-end for tests and throwaway runs

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{list_keys, normalize_key, normalize_prefix, FileStorage};
use crate::error::StorageError;

#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored key, sorted
    pub async fn keys(&self) -> Vec<String> {
        self.files.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl FileStorage for MemoryStorage {
    async fn store(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let key = normalize_key(key)?;
        self.files.write().await.insert(key, data);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let key = normalize_key(key)?;
        self.files
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or(StorageError::NotFound(key))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let key = normalize_key(key)?;
        Ok(self.files.read().await.contains_key(&key))
    }

    async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>, StorageError> {
        let prefix = normalize_prefix(prefix)?;
        let files = self.files.read().await;
        Ok(list_keys(files.keys().map(String::as_str), &prefix, recursive))
    }

    async fn create_dir(&self, key: &str) -> Result<(), StorageError> {
        normalize_key(key).map(|_| ())
    }

    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
