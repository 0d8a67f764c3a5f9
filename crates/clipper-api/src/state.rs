//! Application state.

use std::sync::Arc;

use clipper_queue::{BackendConfig, JobBackend};
use clipper_storage::{connect_blob_store, BlobStore, StorageConfig};

use crate::config::ApiConfig;
use crate::error::ApiResult;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub backend: JobBackend,
    pub blobs: Arc<dyn BlobStore>,
}

impl AppState {
    pub fn new(config: ApiConfig, backend: JobBackend, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            config,
            backend,
            blobs,
        }
    }

    /// Build state from the backend and storage environment variables.
    pub async fn from_env(config: ApiConfig) -> ApiResult<Self> {
        let backend = JobBackend::connect(&BackendConfig::from_env()?).await?;
        let blobs = connect_blob_store(&StorageConfig::from_env()?)?;

        Ok(Self::new(config, backend, blobs))
    }

    /// Whether blobs are served by this process rather than a bucket.
    pub fn serves_local_blobs(&self) -> bool {
        self.blobs.name() == "local"
    }
}
