//! Backend selection.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use crate::error::{QueueError, QueueResult};
use crate::memory::MemoryBackend;
use crate::redis_store::RedisBackend;
use crate::sqlite::SqliteBackend;
use crate::store::{JobRecordStore, WorkQueue};

/// Persistence backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Redis,
    Sqlite,
    Memory,
}

impl FromStr for BackendKind {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(QueueError::config(format!(
                "unknown QUEUE_BACKEND '{}' (expected redis, sqlite or memory)",
                other
            ))),
        }
    }
}

/// Backend configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Redis URL
    pub redis_url: String,
    /// SQLite database file
    pub sqlite_path: PathBuf,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Sqlite,
            redis_url: "redis://localhost:6379".to_string(),
            sqlite_path: PathBuf::from("./data/clipper.db"),
        }
    }
}

impl BackendConfig {
    /// Create config from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        let defaults = Self::default();

        let kind = match std::env::var("QUEUE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.kind,
        };

        Ok(Self {
            kind,
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            sqlite_path: std::env::var("SQLITE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.sqlite_path),
        })
    }

    pub fn memory() -> Self {
        Self {
            kind: BackendKind::Memory,
            ..Default::default()
        }
    }
}

/// The record store and work queue a process runs against.
#[derive(Clone)]
pub struct JobBackend {
    pub records: Arc<dyn JobRecordStore>,
    pub queue: Arc<dyn WorkQueue>,
}

impl JobBackend {
    /// Build the configured backend.
    pub async fn connect(config: &BackendConfig) -> QueueResult<Self> {
        let backend = match config.kind {
            BackendKind::Redis => {
                Self::from_shared(Arc::new(RedisBackend::connect(&config.redis_url).await?))
            }
            BackendKind::Sqlite => {
                Self::from_shared(Arc::new(SqliteBackend::open(&config.sqlite_path)?))
            }
            BackendKind::Memory => Self::from_shared(Arc::new(MemoryBackend::new())),
        };

        info!(backend = ?config.kind, "Job backend ready");
        Ok(backend)
    }

    /// Use one object as both store and queue.
    pub fn from_shared<B>(backend: Arc<B>) -> Self
    where
        B: JobRecordStore + WorkQueue + 'static,
    {
        Self {
            records: backend.clone(),
            queue: backend,
        }
    }

    /// In-memory backend.
    pub fn memory() -> Self {
        Self::from_shared(Arc::new(MemoryBackend::new()))
    }
}
