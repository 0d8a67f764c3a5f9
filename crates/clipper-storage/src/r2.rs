//! Cloudflare R2 backend over the S3 API.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::{BlobStore, VIDEO_CONTENT_TYPE};

/// Configuration for the R2 backend.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
}

impl R2Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: require_env("R2_ENDPOINT_URL")?,
            access_key_id: require_env("R2_ACCESS_KEY_ID")?,
            secret_access_key: require_env("R2_SECRET_ACCESS_KEY")?,
            bucket_name: require_env("R2_BUCKET_NAME")?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

fn require_env(name: &str) -> StorageResult<String> {
    std::env::var(name).map_err(|_| StorageError::config(format!("{} not set", name)))
}

/// R2 blob store.
#[derive(Clone)]
pub struct R2BlobStore {
    client: Client,
    bucket: String,
}

impl R2BlobStore {
    pub fn new(config: R2Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
        }
    }

    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(R2Config::from_env()?))
    }

    fn presign_config(ttl: Duration) -> StorageResult<PresigningConfig> {
        PresigningConfig::expires_in(ttl).map_err(|e| StorageError::PresignFailed(e.to_string()))
    }

    async fn put(&self, body: ByteStream, key: &str) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(VIDEO_CONTENT_TYPE)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", key, e)))?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for R2BlobStore {
    fn name(&self) -> &'static str {
        "r2"
    }

    async fn upload(&self, local_file: &Path, key: &str) -> StorageResult<()> {
        debug!("Uploading {} to {}", local_file.display(), key);

        let body = ByteStream::from_path(local_file)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;
        self.put(body, key).await?;

        info!("Uploaded {} to {}", local_file.display(), key);
        Ok(())
    }

    async fn download(&self, key: &str, local_file: &Path) -> StorageResult<()> {
        debug!("Downloading {} to {}", key, local_file.display());

        let bytes = self.download_bytes(key).await?;

        if let Some(parent) = local_file.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::download_failed(format!("Failed to create directory: {}", e))
            })?;
        }
        tokio::fs::write(local_file, bytes)
            .await
            .map_err(|e| StorageError::download_failed(format!("Failed to write file: {}", e)))?;

        info!("Downloaded {} to {}", key, local_file.display());
        Ok(())
    }

    async fn upload_bytes(&self, data: Vec<u8>, key: &str) -> StorageResult<()> {
        debug!("Uploading {} bytes to {}", data.len(), key);
        self.put(ByteStream::from(data), key).await
    }

    async fn download_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|se| se.is_no_such_key()) == Some(true) {
                    StorageError::not_found(key)
                } else {
                    StorageError::download_failed(format!("{}: {}", key, e))
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(bytes)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().map(|se| se.is_not_found()) == Some(true) => Ok(false),
            Err(e) => Err(StorageError::download_failed(format!("{}: {}", key, e))),
        }
    }

    async fn retrieval_url(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(Self::presign_config(ttl)?)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    async fn upload_url(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(VIDEO_CONTENT_TYPE)
            .presigned(Self::presign_config(ttl)?)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::config(format!("R2 connectivity check failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> R2BlobStore {
        R2BlobStore::new(R2Config {
            endpoint_url: "https://account.r2.cloudflarestorage.com".to_string(),
            access_key_id: "key".to_string(),
            secret_access_key: "secret".to_string(),
            bucket_name: "clips".to_string(),
            region: "auto".to_string(),
        })
    }

    #[tokio::test]
    async fn test_presigned_urls_are_path_style() {
        let store = store();
        let ttl = Duration::from_secs(3600);

        let get = store.retrieval_url("results/a.mp4", ttl).await.unwrap();
        assert!(get.starts_with("https://account.r2.cloudflarestorage.com/clips/results/a.mp4?"));
        assert!(get.contains("X-Amz-Expires=3600"));

        let put = store.upload_url("uploads/b.mp4", ttl).await.unwrap();
        assert!(put.contains("/clips/uploads/b.mp4?"));
    }

    #[tokio::test]
    async fn test_presign_rejects_excessive_ttl() {
        let err = store()
            .retrieval_url("results/a.mp4", Duration::from_secs(60 * 60 * 24 * 8))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::PresignFailed(_)));
    }
}
