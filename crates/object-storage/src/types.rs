//! Staged uploads and object URL parsing.

use serde::Deserialize;
use std::io;
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// A file staged on local disk, waiting to be transmitted to remote storage.
///
/// The backing temp file is removed when the `StagedFile` is dropped or
/// discarded, whatever the outcome of the upload.
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
    file_name: Option<String>,
    content_type: Option<String>,
}

impl StagedFile {
    /// Create an empty staged file inside `dir`.
    pub fn create_in(
        dir: impl AsRef<Path>,
        file_name: Option<String>,
        content_type: Option<String>,
    ) -> io::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(dir)?;

        Ok(Self {
            file,
            file_name,
            content_type,
        })
    }

    /// Create a staged file holding `bytes`.
    pub async fn from_bytes(
        dir: impl AsRef<Path>,
        file_name: Option<String>,
        content_type: Option<String>,
        bytes: &[u8],
    ) -> io::Result<Self> {
        let staged = Self::create_in(dir, file_name, content_type)?;
        staged.write_chunk(bytes).await?;
        Ok(staged)
    }

    /// Append a chunk to the staged file.
    pub async fn write_chunk(&self, chunk: &[u8]) -> io::Result<()> {
        let mut file = tokio::fs::File::from_std(self.file.as_file().try_clone()?);
        file.write_all(chunk).await?;
        file.flush().await
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Original file name as supplied by the client.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Lowercased extension of the original file name, if any.
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(|ext| ext.to_ascii_lowercase())
    }

    /// Remove the staged file from disk.
    pub fn discard(self) {
        let path = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            warn!(path = %path.display(), error = %e, "Error deleting staged file");
        }
    }
}

/// Extract the public id of a stored object from its delivery URL.
///
/// The public id is everything after the version segment (`v` followed by
/// digits), with the file extension removed. Returns `None` when the URL does
/// not carry a version segment or nothing follows it.
pub fn public_id_from_url(url: &str) -> Option<String> {
    let path = url.trim().split(['?', '#']).next()?;
    if path.is_empty() {
        return None;
    }

    let segments: Vec<&str> = path.split('/').collect();
    let version = segments.iter().position(|s| is_version_marker(s))?;
    let rest = &segments[version + 1..];
    if rest.is_empty() || rest.iter().any(|s| s.is_empty()) {
        return None;
    }

    let mut public_id = rest.join("/");
    let last_segment_start = public_id.rfind('/').map_or(0, |i| i + 1);
    if let Some(dot) = public_id.rfind('.') {
        if dot > last_segment_start {
            public_id.truncate(dot);
        }
    }

    Some(public_id)
}

/// Resource type encoded in a delivery URL (`image`, `video` or `raw`).
pub fn resource_type_from_url(url: &str) -> &'static str {
    let segments: Vec<&str> = url.split('/').collect();
    let kind = segments
        .iter()
        .position(|s| *s == "upload")
        .and_then(|i| i.checked_sub(1))
        .map(|i| segments[i]);

    match kind {
        Some("video") => "video",
        Some("raw") => "raw",
        _ => "image",
    }
}

fn is_version_marker(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].chars().all(|c| c.is_ascii_digit())
}

/// Successful upload response.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub secure_url: Option<String>,
}

/// Response to a destroy request.
#[derive(Debug, Clone, Deserialize)]
pub struct DestroyResponse {
    pub result: String,
}

/// Error body returned by the storage API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
}
