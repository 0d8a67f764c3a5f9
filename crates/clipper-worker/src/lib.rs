//! Clip export worker.
//!
//! This crate provides:
//! - The job processor driving one job through its state machine
//! - The worker loop polling the queue with backoff and graceful shutdown
//! - Structured per-job logging and worker metrics

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod processor;
pub mod retry;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{PollOutcome, WorkerLoop};
pub use logging::JobLogger;
pub use processor::{map_transcode_progress, result_key_for, JobOutcome, JobProcessor};
pub use retry::FailureTracker;
