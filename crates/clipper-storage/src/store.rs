//! Blob store trait.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Content type of every stored video.
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Object storage holding source uploads and exported clips.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short backend name for logs and route gating.
    fn name(&self) -> &'static str;

    /// Upload a local file under `key`.
    async fn upload(&self, local_file: &Path, key: &str) -> StorageResult<()>;

    /// Download `key` into a local file, creating parent directories.
    async fn download(&self, key: &str, local_file: &Path) -> StorageResult<()>;

    /// Upload in-memory bytes under `key`.
    async fn upload_bytes(&self, data: Vec<u8>, key: &str) -> StorageResult<()>;

    /// Read an object fully into memory.
    async fn download_bytes(&self, key: &str) -> StorageResult<Vec<u8>>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Time-limited reference a client can GET the object from.
    async fn retrieval_url(&self, key: &str, ttl: Duration) -> StorageResult<String>;

    /// Time-limited reference a client can PUT the object to.
    async fn upload_url(&self, key: &str, ttl: Duration) -> StorageResult<String>;

    /// Reachability check for readiness probes.
    async fn check_connectivity(&self) -> StorageResult<()> {
        Ok(())
    }
}
