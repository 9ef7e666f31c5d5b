// service/storage_service.rs
//
// Narrow client for the external object store. Media bytes must be durable
// and publicly addressable before a job record may reference them.
use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use uuid::Uuid;

use crate::{config::Config, service::error::ServiceError};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{file} exceeds the upload limit of {limit} bytes")]
    Oversize { file: String, limit: usize },

    #[error("upload request for {file} failed: {reason}")]
    Request { file: String, reason: String },

    #[error("object store rejected {file} with status {status}")]
    Status { file: String, status: u16 },
}

impl StorageError {
    pub fn file(&self) -> &str {
        match self {
            StorageError::Oversize { file, .. }
            | StorageError::Request { file, .. }
            | StorageError::Status { file, .. } => file,
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(error: StorageError) -> Self {
        ServiceError::Upload {
            file: error.file().to_string(),
            reason: error.to_string(),
        }
    }
}

/// One media file as submitted by a client, already decoded to raw bytes.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload one object and return its publicly dereferenceable URL.
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        file_name: &str,
    ) -> Result<String, StorageError>;
}

/// HTTP client for a Supabase-style storage bucket.
#[derive(Debug, Clone)]
pub struct BucketStore {
    client: Client,
    base_url: String,
    bucket: String,
    api_key: String,
    max_bytes: usize,
}

impl BucketStore {
    pub fn new(base_url: String, bucket: String, api_key: String, max_bytes: usize) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket,
            api_key,
            max_bytes,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.storage_url.clone(),
            config.storage_bucket.clone(),
            config.storage_api_key.clone(),
            config.max_upload_bytes,
        )
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/object/public/{}/{}", self.base_url, self.bucket, path)
    }
}

#[async_trait]
impl ObjectStore for BucketStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        file_name: &str,
    ) -> Result<String, StorageError> {
        if bytes.len() > self.max_bytes {
            return Err(StorageError::Oversize {
                file: file_name.to_string(),
                limit: self.max_bytes,
            });
        }

        let url = format!("{}/object/{}/{}", self.base_url, self.bucket, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::Request {
                file: file_name.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(StorageError::Status {
                file: file_name.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(self.public_url(path))
    }
}

/// Object path scoped by owner; keeps the original extension so the public
/// URL stays media-type sniffable.
pub fn object_path(owner_id: Uuid, file_name: &str) -> String {
    let ext = file_name.rsplit('.').next().filter(|e| {
        !e.is_empty() && *e != file_name && e.chars().all(|c| c.is_ascii_alphanumeric())
    });

    match ext {
        Some(ext) => format!("{}/{}.{}", owner_id, Uuid::new_v4(), ext.to_lowercase()),
        None => format!("{}/{}", owner_id, Uuid::new_v4()),
    }
}

/// Upload every file or none: the first failure aborts, and the job record
/// is never written with a partial media set.
pub async fn upload_all(
    store: &dyn ObjectStore,
    owner_id: Uuid,
    uploads: Vec<MediaUpload>,
) -> Result<Vec<String>, ServiceError> {
    let mut urls = Vec::with_capacity(uploads.len());

    for upload in uploads {
        let path = object_path(owner_id, &upload.file_name);
        let url = store
            .upload(&path, upload.bytes, &upload.content_type, &upload.file_name)
            .await?;
        urls.push(url);
    }

    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_path_keeps_a_sane_extension() {
        let owner = Uuid::new_v4();

        let path = object_path(owner, "compressor.JPG");
        assert!(path.starts_with(&format!("{}/", owner)));
        assert!(path.ends_with(".jpg"));

        let path = object_path(owner, "no-extension");
        assert!(!path.contains('.'));

        // A trailing dot must not produce an empty extension.
        let path = object_path(owner, "weird.");
        assert!(!path.ends_with('.'));
    }

    #[tokio::test]
    async fn oversize_uploads_are_rejected_before_any_request() {
        let store = BucketStore::new(
            "http://localhost:54321/storage/v1".to_string(),
            "breakdowns".to_string(),
            "".to_string(),
            8,
        );

        let err = store
            .upload("x/y.jpg", vec![0u8; 9], "image/jpeg", "y.jpg")
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Oversize { .. }));
        assert_eq!(err.file(), "y.jpg");
    }
}
