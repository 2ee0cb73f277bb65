//! Remote object storage gateway.
//!
//! Uploads locally staged files to a remote content store and returns a
//! durable URL, and removes previously stored objects by URL. Cleanup is
//! best-effort: [`ObjectStorage::delete`] logs failures and never returns them.

mod client;
mod error;
mod memory;
mod types;

pub use client::CloudinaryClient;
pub use error::StorageError;
pub use memory::MemoryObjectStorage;
pub use types::*;

use async_trait::async_trait;
use tracing::{debug, warn};

/// A remote store for uploaded files.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Transmit a staged file into `folder` and return its retrieval URL.
    ///
    /// The staged file is removed from local disk whether or not the
    /// transmission succeeds.
    async fn upload(&self, file: StagedFile, folder: &str) -> Result<String, StorageError>;

    /// Remove the object referenced by `url`.
    ///
    /// Returns `Ok(false)` when the URL does not identify an object or the
    /// remote store had nothing to remove.
    async fn remove(&self, url: &str) -> Result<bool, StorageError>;

    /// Best-effort removal. Failures are logged, never returned.
    async fn delete(&self, url: &str) {
        match self.remove(url).await {
            Ok(true) => debug!(url, "Deleted stored object"),
            Ok(false) => debug!(url, "No stored object to delete"),
            Err(e) => warn!(url, error = %e, "Failed to delete stored object"),
        }
    }
}
