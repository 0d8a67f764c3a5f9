//! Job record store and work queue.
//!
//! This crate provides:
//! - The [`JobRecordStore`] and [`WorkQueue`] traits
//! - Redis, SQLite and in-memory backends implementing both
//! - Backend selection from the environment via [`BackendConfig`]

pub mod config;
pub mod error;
pub mod memory;
pub mod redis_store;
pub mod sqlite;
pub mod store;

pub use config::{BackendConfig, BackendKind, JobBackend};
pub use error::{QueueError, QueueResult};
pub use memory::MemoryBackend;
pub use redis_store::{RedisBackend, JOB_KEY_PREFIX, QUEUE_KEY};
pub use sqlite::SqliteBackend;
pub use store::{submit_job, JobRecordStore, WorkQueue};
