/*!
 * # Blob Storage
 *
 * Payment proofs (order payments, driver commission settlements) are uploaded
 * to an external blob store; the core only keeps the returned public URL.
 * No validation of image content is performed here.
 */

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use crate::errors::ServiceError;

/// A file handed to the storage collaborator.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Result of a successful upload.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredObject {
    /// Publicly retrievable URL of the uploaded object.
    pub secure_url: String,
}

/// Blob storage contract consumed by the lifecycle services.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, file: UploadFile) -> Result<StoredObject, ServiceError>;
}

/// Uploads files to an unsigned-upload HTTP endpoint and reads back the
/// `secure_url` field of the JSON response.
pub struct HttpObjectStorage {
    client: reqwest::Client,
    upload_url: String,
    upload_preset: Option<String>,
}

impl HttpObjectStorage {
    pub fn new(upload_url: String, upload_preset: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            upload_url,
            upload_preset,
        }
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn upload(&self, file: UploadFile) -> Result<StoredObject, ServiceError> {
        let part = reqwest::multipart::Part::bytes(file.bytes)
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| ServiceError::ExternalServiceError(format!("invalid mime type: {e}")))?;

        let mut form = reqwest::multipart::Form::new().part("file", part);
        if let Some(preset) = &self.upload_preset {
            form = form.text("upload_preset", preset.clone());
        }

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, file = %file.file_name, "Blob storage upload failed");
                ServiceError::ExternalServiceError(format!("blob storage upload failed: {e}"))
            })?;

        if !response.status().is_success() {
            error!(status = %response.status(), file = %file.file_name, "Blob storage rejected upload");
            return Err(ServiceError::ExternalServiceError(format!(
                "blob storage returned status {}",
                response.status()
            )));
        }

        let stored: StoredObject = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("invalid blob storage response: {e}"))
        })?;

        info!(url = %stored.secure_url, "Uploaded file to blob storage");
        Ok(stored)
    }
}

/// In-memory storage used by tests; records uploads and fabricates URLs.
#[derive(Default)]
pub struct InMemoryObjectStorage {
    uploads: Mutex<Vec<String>>,
}

impl InMemoryObjectStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn uploaded_files(&self) -> Vec<String> {
        self.uploads.lock().expect("storage mutex poisoned").clone()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn upload(&self, file: UploadFile) -> Result<StoredObject, ServiceError> {
        self.uploads
            .lock()
            .expect("storage mutex poisoned")
            .push(file.file_name.clone());
        Ok(StoredObject {
            secure_url: format!("https://storage.test/{}", file.file_name),
        })
    }
}

/// Storage stub that always fails; used to exercise upstream-failure paths.
pub struct FailingObjectStorage;

#[async_trait]
impl ObjectStorage for FailingObjectStorage {
    async fn upload(&self, _file: UploadFile) -> Result<StoredObject, ServiceError> {
        Err(ServiceError::ExternalServiceError(
            "blob storage unavailable".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_storage_returns_a_url_and_records_the_upload() {
        let storage = InMemoryObjectStorage::new();
        let stored = storage
            .upload(UploadFile {
                file_name: "proof.png".into(),
                content_type: "image/png".into(),
                bytes: vec![1, 2, 3],
            })
            .await
            .unwrap();

        assert_eq!(stored.secure_url, "https://storage.test/proof.png");
        assert_eq!(storage.uploaded_files(), vec!["proof.png".to_string()]);
    }

    #[tokio::test]
    async fn failing_storage_surfaces_an_upstream_error() {
        let err = FailingObjectStorage
            .upload(UploadFile {
                file_name: "proof.png".into(),
                content_type: "image/png".into(),
                bytes: vec![],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::ExternalServiceError(_)));
    }
}
