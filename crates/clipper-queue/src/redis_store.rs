//! Redis backend for multi-host deployments.
//!
//! Records are JSON strings under `clipper:job:{id}`. The queue is a list
//! at `clipper:queue`: `LPUSH` appends, `RPOP` removes the oldest entry
//! atomically across any number of worker processes.

use async_trait::async_trait;
use clipper_models::{Job, JobId, JobUpdate};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, info};

use crate::error::{QueueError, QueueResult};
use crate::store::{JobRecordStore, WorkQueue};

/// Key prefix for job records.
pub const JOB_KEY_PREFIX: &str = "clipper:job:";
/// List holding queued job ids.
pub const QUEUE_KEY: &str = "clipper:queue";

fn job_key(id: &JobId) -> String {
    format!("{}{}", JOB_KEY_PREFIX, id)
}

/// Redis-backed store and queue sharing one multiplexed connection.
#[derive(Clone)]
pub struct RedisBackend {
    conn: MultiplexedConnection,
}

impl RedisBackend {
    /// Connect to Redis at `url`.
    pub async fn connect(url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(format!("{}: {}", url, e)))?;

        info!("Connected to Redis job store");
        Ok(Self { conn })
    }
}

#[async_trait]
impl JobRecordStore for RedisBackend {
    async fn create(&self, job: &Job) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(job)?;

        let created: bool = conn.set_nx(job_key(&job.id), payload).await?;
        if !created {
            return Err(QueueError::duplicate_id(job.id.as_str()));
        }
        Ok(())
    }

    async fn get(&self, id: &JobId) -> QueueResult<Option<Job>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(job_key(id)).await?;

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, id: &JobId, update: &JobUpdate) -> QueueResult<Job> {
        // Only the worker that dequeued a job writes to it after creation,
        // so a plain read-modify-write does not race.
        let mut job = self
            .get(id)
            .await?
            .ok_or_else(|| QueueError::not_found(id.as_str()))?;
        job.apply(update)?;

        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(job_key(id), serde_json::to_string(&job)?)
            .await?;

        debug!(job_id = %id, status = %job.status, progress = job.progress, "Updated job record");
        Ok(job)
    }

    async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl WorkQueue for RedisBackend {
    async fn enqueue(&self, id: &JobId) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(QUEUE_KEY, id.as_str()).await?;
        Ok(())
    }

    async fn dequeue(&self) -> QueueResult<Option<JobId>> {
        let mut conn = self.conn.clone();
        let id: Option<String> = conn.rpop(QUEUE_KEY, None).await?;
        Ok(id.map(JobId::from))
    }

    async fn len(&self) -> QueueResult<usize> {
        let mut conn = self.conn.clone();
        Ok(conn.llen(QUEUE_KEY).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_key_layout() {
        let id = JobId::from_string("abc");
        assert_eq!(job_key(&id), "clipper:job:abc");
    }
}
