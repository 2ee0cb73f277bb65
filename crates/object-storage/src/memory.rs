//! In-process object storage for development and tests.

use crate::error::StorageError;
use crate::types::{public_id_from_url, StagedFile};
use crate::ObjectStorage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Object storage that keeps uploads in memory.
///
/// URLs follow the same `.../upload/v{version}/{folder}/{name}.{ext}` layout as
/// the remote service, so URL parsing behaves identically.
pub struct MemoryObjectStorage {
    base_url: String,
    objects: RwLock<HashMap<String, Vec<u8>>>,
    next_version: AtomicU64,
}

impl MemoryObjectStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: RwLock::new(HashMap::new()),
            next_version: AtomicU64::new(1),
        }
    }

    /// Whether the object behind `url` is currently stored.
    pub async fn contains(&self, url: &str) -> bool {
        match public_id_from_url(url) {
            Some(id) => self.objects.read().await.contains_key(&id),
            None => false,
        }
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

impl Default for MemoryObjectStorage {
    fn default() -> Self {
        Self::new("memory://objects")
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn upload(&self, file: StagedFile, folder: &str) -> Result<String, StorageError> {
        let read = tokio::fs::read(file.path()).await;
        let extension = file.extension().unwrap_or_else(|| "bin".to_string());
        file.discard();
        let bytes = read?;

        let version = self.next_version.fetch_add(1, Ordering::Relaxed);
        let public_id = if folder.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            format!("{}/{}", folder.trim_matches('/'), Uuid::new_v4())
        };
        let url = format!(
            "{}/image/upload/v{}/{}.{}",
            self.base_url, version, public_id, extension
        );

        self.objects.write().await.insert(public_id, bytes);
        debug!(url = %url, "Stored object in memory");
        Ok(url)
    }

    async fn remove(&self, url: &str) -> Result<bool, StorageError> {
        let Some(public_id) = public_id_from_url(url) else {
            return Ok(false);
        };
        Ok(self.objects.write().await.remove(&public_id).is_some())
    }
}
