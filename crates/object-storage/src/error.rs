//! Object storage errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Upload failed: {0}")]
    Upload(String),
}
