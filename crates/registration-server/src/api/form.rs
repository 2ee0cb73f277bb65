//! Request body extraction for registration submissions.
//!
//! Accepts `multipart/form-data` (text fields plus one optional file part
//! named `image`), `application/json` and `application/x-www-form-urlencoded`.
//! A file part is streamed to a staged file on local disk chunk by chunk.

use super::AppState;
use crate::error::{ApiError, RegistrationError};
use axum::{
    async_trait,
    extract::{multipart::Field, FromRequest, Multipart, Request},
    http::{header::CONTENT_TYPE, StatusCode},
    Form, Json,
};
use object_storage::StagedFile;
use registration_store::RegistrationInput;
use tracing::{debug, warn};

/// Name of the multipart part carrying the proof of payment.
pub const IMAGE_FIELD: &str = "image";

/// Parsed registration body: text fields and an optional staged image.
#[derive(Debug, Default)]
pub struct RegistrationForm {
    pub input: RegistrationInput,
    pub image: Option<StagedFile>,
}

#[async_trait]
impl FromRequest<AppState> for RegistrationForm {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase())
            .unwrap_or_default();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|rej| ApiError::new(rej.status(), rej.body_text()))?;
            return read_multipart(multipart, state).await;
        }

        if content_type.starts_with("application/json") {
            let Json(input) = Json::<RegistrationInput>::from_request(req, state)
                .await
                .map_err(|rej| ApiError::new(rej.status(), rej.body_text()))?;
            return Ok(Self { input, image: None });
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(input) = Form::<RegistrationInput>::from_request(req, state)
                .await
                .map_err(|rej| ApiError::new(rej.status(), rej.body_text()))?;
            return Ok(Self { input, image: None });
        }

        debug!(content_type = %content_type, "No parseable request body");
        Ok(Self::default())
    }
}

async fn read_multipart(mut multipart: Multipart, state: &AppState) -> Result<RegistrationForm, ApiError> {
    let mut form = RegistrationForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == IMAGE_FIELD && field.file_name().is_some() {
            if form.image.is_some() {
                return Err(ApiError::new(
                    StatusCode::BAD_REQUEST,
                    "Only one image may be uploaded",
                ));
            }
            form.image = stage_image(field, state).await?;
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
        if !form.input.set(&name, value) {
            debug!(field = %name, "Ignoring unknown form field");
        }
    }

    Ok(form)
}

/// Stream a file part to disk. An empty file is treated as absent.
async fn stage_image(mut field: Field<'_>, state: &AppState) -> Result<Option<StagedFile>, ApiError> {
    let internal = |e: std::io::Error| {
        ApiError::from_error(
            RegistrationError::Internal(format!("failed to stage upload: {e}")),
            state.settings.expose_error_details,
        )
    };

    let staged = StagedFile::create_in(
        &state.settings.temp_dir,
        field.file_name().map(str::to_string),
        field.content_type().map(str::to_string),
    )
    .map_err(internal)?;

    let mut size = 0usize;
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                staged.discard();
                return Err(ApiError::new(e.status(), e.body_text()));
            }
        };
        if let Err(e) = staged.write_chunk(&chunk).await {
            staged.discard();
            return Err(internal(e));
        }
        size += chunk.len();
    }

    if size == 0 {
        warn!(file_name = ?staged.file_name(), "Discarding empty image upload");
        staged.discard();
        return Ok(None);
    }

    debug!(file_name = ?staged.file_name(), size, "Image staged");
    Ok(Some(staged))
}
