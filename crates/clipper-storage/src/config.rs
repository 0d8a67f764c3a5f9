//! Storage backend selection.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::error::{StorageError, StorageResult};
use crate::local::LocalBlobStore;
use crate::r2::{R2BlobStore, R2Config};
use crate::store::BlobStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Local,
    R2,
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub kind: StorageKind,
    /// Root directory for the local backend
    pub local_root: PathBuf,
    /// Base URL the API is reachable at, used for local references
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Local,
            local_root: PathBuf::from("./data/storage"),
            public_base_url: "http://localhost:8000".to_string(),
        }
    }
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let defaults = Self::default();

        let kind = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "local" => StorageKind::Local,
            "r2" | "s3" => StorageKind::R2,
            other => {
                return Err(StorageError::config(format!(
                    "unknown STORAGE_BACKEND '{}' (expected local or r2)",
                    other
                )))
            }
        };

        Ok(Self {
            kind,
            local_root: std::env::var("STORAGE_LOCAL_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.local_root),
            public_base_url: std::env::var("PUBLIC_BASE_URL").unwrap_or(defaults.public_base_url),
        })
    }
}

/// Build the configured blob store.
pub fn connect_blob_store(config: &StorageConfig) -> StorageResult<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config.kind {
        StorageKind::Local => Arc::new(LocalBlobStore::new(
            config.local_root.clone(),
            config.public_base_url.clone(),
        )),
        StorageKind::R2 => Arc::new(R2BlobStore::new(R2Config::from_env()?)),
    };

    info!(backend = store.name(), "Blob store ready");
    Ok(store)
}
