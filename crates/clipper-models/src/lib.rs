//! Shared data models for the clip export pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, their status state machine and partial updates
//! - Export sizes
//! - Job submission requests and their validation
//! - Encoding configuration

pub mod encoding;
pub mod error;
pub mod export_size;
pub mod job;
pub mod request;

// Re-export common types
pub use encoding::EncodingConfig;
pub use error::{ModelError, ModelResult};
pub use export_size::ExportSize;
pub use job::{Job, JobId, JobStatus, JobUpdate};
pub use request::{CreateJobRequest, CreateJobResponse, MAX_CLIP_DURATION_SECS, MIN_CLIP_DURATION_SECS};
