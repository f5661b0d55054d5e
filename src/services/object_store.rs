use async_trait::async_trait;
use s3::error::S3Error;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("s3 error: {0}")]
    S3(#[from] S3Error),

    #[error("credentials error: {0}")]
    Credentials(#[from] s3::creds::error::CredentialsError),

    #[error("unexpected status {status} for object {key}")]
    UnexpectedStatus { key: String, status: u16 },
}

/// Object storage behind the document store. Keys follow the
/// `uploads/{category}/{owner}/{filename}` layout and must stay resolvable
/// for the lifetime of the metadata record that references them.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError>;

    /// Removes the object. Deleting a key with no backing object is an
    /// error (`NotFound`), so callers surface the inconsistency instead of
    /// dropping metadata for a file that was never there.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Stable public URL for the object, recorded on upload.
    fn object_url(&self, key: &str) -> String;

    /// Time-limited signed URL for direct download.
    async fn presigned_url(&self, key: &str, expiry_secs: u32) -> Result<String, StorageError>;
}

pub struct S3ObjectStore {
    bucket: Box<Bucket>,
    base_url: String,
}

impl S3ObjectStore {
    pub fn new(cfg: &Config) -> Result<Self, StorageError> {
        let region = match &cfg.s3_endpoint {
            Some(endpoint) => Region::Custom {
                region: cfg.s3_region.clone(),
                endpoint: endpoint.trim_end_matches('/').to_string(),
            },
            None => cfg.s3_region.parse().unwrap_or(Region::UsEast1),
        };
        let credentials = Credentials::new(
            Some(&cfg.s3_access_key_id),
            Some(&cfg.s3_secret_access_key),
            None,
            None,
            None,
        )?;

        let base_url = match &cfg.s3_endpoint {
            Some(endpoint) => {
                format!("{}/{}", endpoint.trim_end_matches('/'), cfg.s3_bucket_name)
            }
            None => format!(
                "https://{}.s3.{}.amazonaws.com",
                cfg.s3_bucket_name, cfg.s3_region
            ),
        };

        let mut bucket = Bucket::new(&cfg.s3_bucket_name, region, credentials)?;
        if cfg.s3_endpoint.is_some() {
            bucket = bucket.with_path_style();
        }

        Ok(Self { bucket, base_url })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError> {
        let response = self
            .bucket
            .put_object_with_content_type(key, data, content_type)
            .await?;
        match response.status_code() {
            200 | 204 => Ok(()),
            status => Err(StorageError::UnexpectedStatus {
                key: key.to_string(),
                status,
            }),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        // S3 deletes are idempotent and would report success for a key that
        // was never written; check first so a missing object is an error.
        if !self.exists(key).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }
        let response = self.bucket.delete_object(key).await?;
        match response.status_code() {
            200 | 204 => Ok(()),
            status => Err(StorageError::UnexpectedStatus {
                key: key.to_string(),
                status,
            }),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self.bucket.head_object(key).await {
            Ok((_, 200)) => Ok(true),
            Ok((_, 404)) => Ok(false),
            Ok((_, status)) => Err(StorageError::UnexpectedStatus {
                key: key.to_string(),
                status,
            }),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    async fn presigned_url(&self, key: &str, expiry_secs: u32) -> Result<String, StorageError> {
        let url = self.bucket.presign_get(key, expiry_secs, None).await?;
        Ok(url)
    }
}

/// In-memory object store for tests.
#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;
    use std::sync::Arc;

    use tokio::sync::RwLock;

    use super::*;

    #[derive(Default)]
    pub struct MemoryObjectStore {
        objects: Arc<RwLock<HashMap<String, (Vec<u8>, String)>>>,
    }

    impl MemoryObjectStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn keys(&self) -> Vec<String> {
            self.objects.read().await.keys().cloned().collect()
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryObjectStore {
        async fn put(
            &self,
            key: &str,
            data: &[u8],
            content_type: &str,
        ) -> Result<(), StorageError> {
            self.objects
                .write()
                .await
                .insert(key.to_string(), (data.to_vec(), content_type.to_string()));
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            match self.objects.write().await.remove(key) {
                Some(_) => Ok(()),
                None => Err(StorageError::NotFound(key.to_string())),
            }
        }

        async fn exists(&self, key: &str) -> Result<bool, StorageError> {
            Ok(self.objects.read().await.contains_key(key))
        }

        fn object_url(&self, key: &str) -> String {
            format!("memory://{}", key)
        }

        async fn presigned_url(&self, key: &str, _expiry_secs: u32) -> Result<String, StorageError> {
            Ok(format!("memory://{}?signed", key))
        }
    }
}
