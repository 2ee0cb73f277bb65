//! Error types for the registration service.

use crate::api::ApiResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use object_storage::StorageError;
use registration_store::StoreError;
use thiserror::Error;
use tracing::error;

/// Message returned for server errors when details are hidden.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Registration lifecycle errors.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("{0}")]
    Validation(String),

    #[error("Please upload proof of payment")]
    MissingProofOfPayment,

    #[error("This email has already been registered")]
    Conflict(String),

    #[error("Registration not found")]
    NotFound(String),

    #[error("Image upload failed: {0}")]
    UploadFailure(#[source] StorageError),

    #[error("Persistence failure: {0}")]
    Persistence(#[source] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RegistrationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RegistrationError::Validation(_)
            | RegistrationError::MissingProofOfPayment
            | RegistrationError::Conflict(_) => StatusCode::BAD_REQUEST,
            RegistrationError::NotFound(_) => StatusCode::NOT_FOUND,
            RegistrationError::UploadFailure(_)
            | RegistrationError::Persistence(_)
            | RegistrationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for RegistrationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail(email) => RegistrationError::Conflict(email),
            StoreError::NotFound(id) => RegistrationError::NotFound(id),
            StoreError::Validation(message) => RegistrationError::Validation(message),
            other => RegistrationError::Persistence(other),
        }
    }
}

/// An error ready to be sent to the client as a failure envelope.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Convert a lifecycle error. Server error details are replaced with a
    /// generic message unless `expose_details` is set.
    pub fn from_error(error: RegistrationError, expose_details: bool) -> Self {
        let status = error.status_code();
        if status.is_server_error() {
            error!(error = %error, "Request failed");
            if !expose_details {
                return Self::new(status, GENERIC_ERROR_MESSAGE);
            }
        }
        Self::new(status, error.to_string())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::failure(self.message))).into_response()
    }
}
