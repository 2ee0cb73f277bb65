//! Registration lifecycle: keeps stored records and remote images in step.
//!
//! Every state-changing operation orders its steps so that a record never
//! references an image that was not successfully uploaded:
//!
//! - register: validate, check duplicate, upload, then create
//! - update: look up, validate, (delete old image, upload new), then update
//! - delete: look up, delete image (best-effort), then delete record
//!
//! Remote deletes are best-effort and never fail an operation. A store failure
//! after an upload leaves the uploaded object orphaned; it is logged with an
//! `orphaned_url` field so it can be cleaned up out of band.

use crate::error::RegistrationError;
use object_storage::{ObjectStorage, StagedFile};
use registration_store::{
    Page, PageRequest, Registration, RegistrationInput, RegistrationStore,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Default remote folder for proof-of-payment uploads.
pub const DEFAULT_UPLOAD_FOLDER: &str = "3SignetPaymentUploads";

/// Coordinates the registration store and remote object storage.
pub struct RegistrationService {
    store: Arc<dyn RegistrationStore>,
    storage: Arc<dyn ObjectStorage>,
    folder: String,
}

impl RegistrationService {
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        storage: Arc<dyn ObjectStorage>,
        folder: impl Into<String>,
    ) -> Self {
        Self {
            store,
            storage,
            folder: folder.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn RegistrationStore> {
        &self.store
    }

    /// Register a new applicant with their proof of payment.
    #[instrument(skip_all)]
    pub async fn register(
        &self,
        input: RegistrationInput,
        image: Option<StagedFile>,
    ) -> Result<Registration, RegistrationError> {
        let Some(image) = image else {
            warn!("Registration submitted without proof of payment");
            return Err(RegistrationError::MissingProofOfPayment);
        };

        let fields = input.into_fields()?;

        if self.store.find_by_email(&fields.email).await?.is_some() {
            info!(email = %fields.email, "Existing registration found for email");
            return Err(RegistrationError::Conflict(fields.email));
        }

        let url = self
            .storage
            .upload(image, &self.folder)
            .await
            .map_err(RegistrationError::UploadFailure)?;
        info!(url = %url, "Proof of payment uploaded");

        match self.store.create(fields.with_image(url.clone())).await {
            Ok(registration) => {
                info!(id = %registration.id, email = %registration.email, "Registration created");
                Ok(registration)
            }
            Err(e) => {
                warn!(orphaned_url = %url, error = %e, "Registration not stored after upload");
                Err(e.into())
            }
        }
    }

    /// Apply a partial update, optionally replacing the stored image.
    #[instrument(skip(self, input, image), fields(replace_image = image.is_some()))]
    pub async fn update(
        &self,
        id: &str,
        input: RegistrationInput,
        image: Option<StagedFile>,
    ) -> Result<Registration, RegistrationError> {
        let current = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| RegistrationError::NotFound(id.to_string()))?;

        let mut patch = input.into_patch()?;

        if let Some(email) = &patch.email {
            if let Some(owner) = self.store.find_by_email(email).await? {
                if owner.id != current.id {
                    info!(email = %email, "Update would duplicate another registration's email");
                    return Err(RegistrationError::Conflict(email.clone()));
                }
            }
        }

        let mut uploaded = None;
        if let Some(file) = image {
            self.storage.delete(&current.image).await;

            let url = match self.storage.upload(file, &self.folder).await {
                Ok(url) => url,
                Err(e) => {
                    warn!(
                        dangling_image = %current.image,
                        "Replacement upload failed after the old image was deleted"
                    );
                    return Err(RegistrationError::UploadFailure(e));
                }
            };
            info!(url = %url, "Replacement proof of payment uploaded");
            patch.image = Some(url.clone());
            uploaded = Some(url);
        }

        match self.store.update(id, patch).await {
            Ok(registration) => {
                info!(id = %registration.id, "Registration updated");
                Ok(registration)
            }
            Err(e) => {
                if let Some(url) = uploaded {
                    warn!(orphaned_url = %url, error = %e, "Registration not updated after upload");
                }
                Err(e.into())
            }
        }
    }

    pub async fn list(&self, page: PageRequest) -> Result<Page<Registration>, RegistrationError> {
        Ok(self.store.list(page).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Registration, RegistrationError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| RegistrationError::NotFound(id.to_string()))
    }

    /// Delete a registration and its stored image.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), RegistrationError> {
        let registration = self.get(id).await?;

        self.storage.delete(&registration.image).await;
        self.store.delete_by_id(id).await?;

        info!(id = %id, "Registration deleted");
        Ok(())
    }
}
