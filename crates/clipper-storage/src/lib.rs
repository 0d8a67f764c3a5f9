//! Blob storage for clip sources and results.
//!
//! This crate provides:
//! - The [`BlobStore`] trait used by the worker and the API
//! - A local filesystem backend with key validation
//! - A Cloudflare R2 (S3-compatible) backend with presigned URLs

pub mod config;
pub mod error;
pub mod local;
pub mod r2;
pub mod store;

pub use config::{connect_blob_store, StorageConfig, StorageKind};
pub use error::{StorageError, StorageResult};
pub use local::{validate_key, LocalBlobStore};
pub use r2::{R2BlobStore, R2Config};
pub use store::{BlobStore, VIDEO_CONTENT_TYPE};
