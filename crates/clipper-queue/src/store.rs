//! Storage traits shared by every backend.

use async_trait::async_trait;
use clipper_models::{Job, JobId, JobUpdate};
use tracing::info;

use crate::error::QueueResult;

/// Durable key-value store of job records.
#[async_trait]
pub trait JobRecordStore: Send + Sync {
    /// Insert a new record. Fails with `DuplicateId` if the id exists.
    async fn create(&self, job: &Job) -> QueueResult<()>;

    /// Point lookup by id.
    async fn get(&self, id: &JobId) -> QueueResult<Option<Job>>;

    /// Merge a partial update and return the stored record.
    ///
    /// Fails with `NotFound` if the id is absent and with
    /// `InvalidTransition` if the record is terminal or the status step
    /// is illegal. Progress regressions while processing are dropped.
    async fn update(&self, id: &JobId, update: &JobUpdate) -> QueueResult<Job>;

    /// Cheap reachability check for readiness probes.
    async fn ping(&self) -> QueueResult<()> {
        Ok(())
    }
}

/// FIFO of job ids awaiting processing.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Append an id to the tail.
    async fn enqueue(&self, id: &JobId) -> QueueResult<()>;

    /// Atomically remove and return the oldest id. `None` when empty.
    async fn dequeue(&self) -> QueueResult<Option<JobId>>;

    /// Current queue depth.
    async fn len(&self) -> QueueResult<usize>;

    async fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len().await? == 0)
    }
}

/// Persist a new job and make it visible to workers.
///
/// The record is written before the id is enqueued so a worker can never
/// dequeue an id whose record does not exist yet.
pub async fn submit_job(
    records: &dyn JobRecordStore,
    queue: &dyn WorkQueue,
    job: &Job,
) -> QueueResult<()> {
    records.create(job).await?;
    queue.enqueue(&job.id).await?;

    info!(
        job_id = %job.id,
        size = %job.size,
        start_time = job.start_time,
        duration = job.duration,
        "Submitted job"
    );
    Ok(())
}
