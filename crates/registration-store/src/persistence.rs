//! Durable storage for the registry.

use crate::error::StoreError;
use crate::registry::{Registry, Snapshot};
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info};

/// JSON snapshot file on local disk.
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Write the registry atomically (temp file + rename).
    pub async fn save(&self, registry: &Registry) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(&registry.snapshot())?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &data).await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!(
            "Saved registry ({} records, {} bytes) to {:?}",
            registry.len(),
            data.len(),
            self.path
        );
        Ok(())
    }

    /// Load the registry. A missing file yields an empty registry.
    pub async fn load(&self) -> Result<Registry, StoreError> {
        if !fs::try_exists(&self.path).await? {
            info!(
                "Registry file not found at {:?}, starting with empty registry",
                self.path
            );
            return Ok(Registry::new());
        }

        let data = fs::read(&self.path).await?;
        let snapshot: Snapshot = serde_json::from_slice(&data)?;
        let registry = Registry::from_snapshot(snapshot)?;

        info!(
            "Loaded registry with {} records from {:?}",
            registry.len(),
            self.path
        );
        Ok(registry)
    }
}

/// No persistence; records live only as long as the process.
pub struct MemoryPersistence;

impl MemoryPersistence {
    pub async fn save(&self, _registry: &Registry) -> Result<(), StoreError> {
        debug!("Memory persistence: save is a no-op");
        Ok(())
    }

    pub async fn load(&self) -> Result<Registry, StoreError> {
        Ok(Registry::new())
    }
}

/// Persistence backend selected at startup.
pub enum Persistence {
    File(FilePersistence),
    Memory(MemoryPersistence),
}

impl Persistence {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Persistence::File(FilePersistence::new(path))
    }

    pub fn memory() -> Self {
        Persistence::Memory(MemoryPersistence)
    }

    pub async fn save(&self, registry: &Registry) -> Result<(), StoreError> {
        match self {
            Persistence::File(p) => p.save(registry).await,
            Persistence::Memory(p) => p.save(registry).await,
        }
    }

    pub async fn load(&self) -> Result<Registry, StoreError> {
        match self {
            Persistence::File(p) => p.load().await,
            Persistence::Memory(p) => p.load().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassInterest, RegistrationFields, SectionInterest};
    use chrono::Utc;

    fn registry_with_one() -> Registry {
        let mut registry = Registry::new();
        registry
            .insert(
                RegistrationFields {
                    name: "Grace".into(),
                    email: "grace@navy.mil".into(),
                    phone: "5551234567".into(),
                    class_interest: ClassInterest::PythonMasterClass,
                    section_interest: SectionInterest::OnlyWeekend,
                }
                .with_image("https://cdn.test/image/upload/v1/p/g.png"),
                Utc::now(),
            )
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = FilePersistence::new(dir.path().join("nested/registrations.json"));

        persistence.save(&registry_with_one()).await.unwrap();
        let loaded = persistence.load().await.unwrap();

        assert_eq!(loaded.len(), 1);
        assert!(loaded.find_by_email("grace@navy.mil").is_some());
        assert!(!dir.path().join("nested/registrations.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Persistence::file(dir.path().join("none.json"));
        assert!(persistence.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let result = Persistence::file(&path).load().await;
        assert!(matches!(result, Err(StoreError::Json(_))));
    }

    #[tokio::test]
    async fn test_memory_persistence_forgets() {
        let persistence = Persistence::memory();
        persistence.save(&registry_with_one()).await.unwrap();
        assert!(persistence.load().await.unwrap().is_empty());
    }
}
