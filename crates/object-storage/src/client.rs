//! Cloudinary HTTP client.

use crate::error::StorageError;
use crate::types::*;
use crate::ObjectStorage;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Signed client for the Cloudinary upload API.
///
/// Requests are signed with SHA-256, so the account must have SHA-256
/// signatures enabled. The API secret is held as a `SecretString` and never
/// appears in debug output.
#[derive(Clone)]
pub struct CloudinaryClient {
    client: Client,
    api_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: SecretString,
}

impl CloudinaryClient {
    /// Create a new Cloudinary client.
    pub fn new(
        api_url: impl Into<String>,
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: SecretString,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret,
        })
    }

    /// Sign request parameters: SHA-256 over the sorted `key=value` pairs
    /// joined with `&`, followed by the API secret.
    pub fn sign(&self, params: &[(&str, String)]) -> String {
        let mut sorted: Vec<&(&str, String)> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let to_sign = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(self.api_secret.expose_secret().as_bytes());
        hex::encode(hasher.finalize())
    }

    async fn transmit(&self, file: &StagedFile, folder: &str) -> Result<String, StorageError> {
        let bytes = tokio::fs::read(file.path()).await?;
        let timestamp = Utc::now().timestamp().to_string();

        let signature = self.sign(&[
            ("folder", folder.to_string()),
            ("timestamp", timestamp.clone()),
        ]);

        let mut part = Part::bytes(bytes).file_name(file.file_name().unwrap_or("upload").to_string());
        if let Some(content_type) = file.content_type() {
            part = part.mime_str(content_type)?;
        }

        let form = Form::new()
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.to_string())
            .text("signature", signature)
            .text("signature_algorithm", "sha256")
            .part("file", part);

        let response = self
            .client
            .post(format!("{}/v1_1/{}/auto/upload", self.api_url, self.cloud_name))
            .multipart(form)
            .send()
            .await?;

        let uploaded: UploadResponse = self.handle_response(response).await?;

        uploaded
            .secure_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| StorageError::Upload("Response did not include a secure_url".into()))
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);

        Err(StorageError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ObjectStorage for CloudinaryClient {
    #[instrument(skip(self, file), fields(file_name = ?file.file_name()))]
    async fn upload(&self, file: StagedFile, folder: &str) -> Result<String, StorageError> {
        let result = self.transmit(&file, folder).await;
        file.discard();

        match &result {
            Ok(url) => debug!(url = %url, "Upload complete"),
            Err(e) => warn!(error = %e, "Upload to Cloudinary failed"),
        }
        result
    }

    #[instrument(skip(self))]
    async fn remove(&self, url: &str) -> Result<bool, StorageError> {
        let Some(public_id) = public_id_from_url(url) else {
            debug!("URL does not identify a stored object, skipping delete");
            return Ok(false);
        };
        let resource_type = resource_type_from_url(url);
        let timestamp = Utc::now().timestamp().to_string();

        let signature = self.sign(&[
            ("public_id", public_id.clone()),
            ("timestamp", timestamp.clone()),
        ]);

        let params = [
            ("public_id", public_id.as_str()),
            ("timestamp", timestamp.as_str()),
            ("api_key", self.api_key.as_str()),
            ("signature", signature.as_str()),
            ("signature_algorithm", "sha256"),
        ];

        let response = self
            .client
            .post(format!(
                "{}/v1_1/{}/{}/destroy",
                self.api_url, self.cloud_name, resource_type
            ))
            .form(&params)
            .send()
            .await?;

        let destroyed: DestroyResponse = self.handle_response(response).await?;
        debug!(public_id = %public_id, result = %destroyed.result, "Destroy request completed");

        Ok(destroyed.result == "ok")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> CloudinaryClient {
        CloudinaryClient::new(
            server.uri(),
            "demo",
            "key-123",
            SecretString::new("shh".into()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    async fn staged(dir: &tempfile::TempDir) -> StagedFile {
        StagedFile::from_bytes(
            dir.path(),
            Some("receipt.png".into()),
            Some("image/png".into()),
            b"fake image bytes",
        )
        .await
        .unwrap()
    }

    #[test]
    fn test_signature_is_order_independent() {
        let client = CloudinaryClient::new(
            "http://localhost",
            "demo",
            "key",
            SecretString::new("secret".into()),
            Duration::from_secs(5),
        )
        .unwrap();

        let a = client.sign(&[("timestamp", "1".into()), ("folder", "f".into())]);
        let b = client.sign(&[("folder", "f".into()), ("timestamp", "1".into())]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let mut hasher = Sha256::new();
        hasher.update(b"folder=f&timestamp=1secret");
        assert_eq!(a, hex::encode(hasher.finalize()));
    }

    #[tokio::test]
    async fn test_upload_returns_secure_url_and_removes_staged_file() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .and(path("/v1_1/demo/auto/upload"))
            .and(body_string_contains("3SignetPaymentUploads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "secure_url": "https://res.cloudinary.com/demo/image/upload/v1700000000/3SignetPaymentUploads/abc.png",
                "public_id": "3SignetPaymentUploads/abc"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let file = staged(&dir).await;
        let staged_path = file.path().to_path_buf();

        let url = test_client(&server)
            .upload(file, "3SignetPaymentUploads")
            .await
            .unwrap();

        assert!(url.ends_with("/3SignetPaymentUploads/abc.png"));
        assert!(!staged_path.exists());
    }

    #[tokio::test]
    async fn test_upload_failure_still_removes_staged_file() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .and(path("/v1_1/demo/auto/upload"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": { "message": "Invalid Signature" }
            })))
            .mount(&server)
            .await;

        let file = staged(&dir).await;
        let staged_path = file.path().to_path_buf();

        let result = test_client(&server).upload(file, "folder").await;

        match result {
            Err(StorageError::Api { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid Signature");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!staged_path.exists());
    }

    #[tokio::test]
    async fn test_upload_without_secure_url_is_an_error() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .and(path("/v1_1/demo/auto/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "public_id": "3SignetPaymentUploads/abc"
            })))
            .mount(&server)
            .await;

        let result = test_client(&server)
            .upload(staged(&dir).await, "3SignetPaymentUploads")
            .await;

        assert!(matches!(result, Err(StorageError::Upload(_))));
    }

    #[tokio::test]
    async fn test_remove_sends_public_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1_1/demo/image/destroy"))
            .and(body_string_contains("public_id=3SignetPaymentUploads%2Fabc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": "ok"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let removed = test_client(&server)
            .remove("https://res.cloudinary.com/demo/image/upload/v1700000000/3SignetPaymentUploads/abc.png")
            .await
            .unwrap();
        assert!(removed);
    }

    #[tokio::test]
    async fn test_remove_not_found_is_not_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1_1/demo/image/destroy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": "not found"
            })))
            .mount(&server)
            .await;

        let removed = test_client(&server)
            .remove("https://res.cloudinary.com/demo/image/upload/v1/gone.png")
            .await
            .unwrap();
        assert!(!removed);
    }

    #[tokio::test]
    async fn test_remove_unparseable_url_makes_no_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(&server);
        assert!(!client.remove("").await.unwrap());
        assert!(!client.remove("https://example.com/no-version/file.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_swallows_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1_1/demo/image/destroy"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        // Must not panic or surface the failure
        test_client(&server)
            .delete("https://res.cloudinary.com/demo/image/upload/v12/folder/x.jpg")
            .await;
    }
}
