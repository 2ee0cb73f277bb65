//! Registration store errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("Registration id already in use: {0}")]
    DuplicateId(String),

    #[error("Access token already assigned to another registration")]
    DuplicateAccessToken,

    #[error("Registration not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
