//! Queue error types.

use clipper_models::ModelError;
use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job already exists: {0}")]
    DuplicateId(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl QueueError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn duplicate_id(id: impl Into<String>) -> Self {
        Self::DuplicateId(id.into())
    }

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Storage or connectivity faults that are worth retrying after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            QueueError::ConnectionFailed(_) | QueueError::Redis(_) | QueueError::Sqlite(_)
        )
    }
}

impl From<ModelError> for QueueError {
    fn from(e: ModelError) -> Self {
        Self::InvalidTransition(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipper_models::JobStatus;

    #[test]
    fn test_transient_classification() {
        assert!(QueueError::connection_failed("refused").is_transient());
        assert!(!QueueError::not_found("abc").is_transient());
        assert!(!QueueError::duplicate_id("abc").is_transient());
    }

    #[test]
    fn test_model_error_maps_to_invalid_transition() {
        let err: QueueError = ModelError::Terminal(JobStatus::Completed).into();
        assert!(matches!(err, QueueError::InvalidTransition(_)));
        assert!(err.to_string().contains("completed"));
    }
}
