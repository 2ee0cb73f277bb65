//! The registration store contract and its production implementation.

use crate::error::StoreError;
use crate::page::{Page, PageRequest};
use crate::persistence::Persistence;
use crate::registry::Registry;
use crate::types::{NewRegistration, Registration, RegistrationPatch};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Persistent registration records.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Case-insensitive lookup by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Registration>, StoreError>;

    /// Create a registration. Fails with `DuplicateEmail` if the normalized
    /// email is already taken.
    async fn create(&self, new: NewRegistration) -> Result<Registration, StoreError>;

    /// Newest-first page of registrations.
    async fn list(&self, page: PageRequest) -> Result<Page<Registration>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Registration>, StoreError>;

    /// Apply a partial update, re-validating changed fields.
    async fn update(&self, id: &str, patch: RegistrationPatch)
        -> Result<Registration, StoreError>;

    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}

/// Registry guarded by a lock and written through to a persistence backend.
///
/// Mutations are applied to a copy which is saved before it replaces the live
/// registry, so a failed save leaves both memory and disk unchanged.
pub struct RegistrationRepository {
    registry: RwLock<Registry>,
    persistence: Persistence,
}

impl RegistrationRepository {
    /// Open a repository, loading any existing records.
    pub async fn open(persistence: Persistence) -> Result<Self, StoreError> {
        let registry = persistence.load().await?;
        Ok(Self {
            registry: RwLock::new(registry),
            persistence,
        })
    }

    /// A repository with no persistence.
    pub fn in_memory() -> Self {
        Self {
            registry: RwLock::new(Registry::new()),
            persistence: Persistence::memory(),
        }
    }

    async fn commit<T>(
        &self,
        apply: impl FnOnce(&mut Registry) -> Result<T, StoreError> + Send,
    ) -> Result<T, StoreError> {
        let mut registry = self.registry.write().await;
        let mut next = registry.clone();
        let result = apply(&mut next)?;
        self.persistence.save(&next).await?;
        *registry = next;
        Ok(result)
    }
}

#[async_trait]
impl RegistrationStore for RegistrationRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<Registration>, StoreError> {
        Ok(self.registry.read().await.find_by_email(email).cloned())
    }

    #[instrument(skip(self, new), fields(email = %new.fields.email))]
    async fn create(&self, new: NewRegistration) -> Result<Registration, StoreError> {
        let registration = self.commit(|r| r.insert(new, Utc::now())).await?;
        debug!(id = %registration.id, "Registration stored");
        Ok(registration)
    }

    async fn list(&self, page: PageRequest) -> Result<Page<Registration>, StoreError> {
        Ok(self.registry.read().await.page(page))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Registration>, StoreError> {
        Ok(self.registry.read().await.get(id).cloned())
    }

    #[instrument(skip(self, patch))]
    async fn update(
        &self,
        id: &str,
        patch: RegistrationPatch,
    ) -> Result<Registration, StoreError> {
        self.commit(|r| r.update(id, patch, Utc::now())).await
    }

    #[instrument(skip(self))]
    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        self.commit(|r| r.remove(id).map(|_| ())).await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.registry.read().await.len())
    }
}
