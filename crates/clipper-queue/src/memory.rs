//! In-process backend for tests and single-process development.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use clipper_models::{Job, JobId, JobUpdate};
use tokio::sync::Mutex;

use crate::error::{QueueError, QueueResult};
use crate::store::{JobRecordStore, WorkQueue};

/// Record map and queue guarded by async mutexes.
#[derive(Default)]
pub struct MemoryBackend {
    jobs: Mutex<HashMap<JobId, Job>>,
    queue: Mutex<VecDeque<JobId>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRecordStore for MemoryBackend {
    async fn create(&self, job: &Job) -> QueueResult<()> {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&job.id) {
            return Err(QueueError::duplicate_id(job.id.as_str()));
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get(&self, id: &JobId) -> QueueResult<Option<Job>> {
        Ok(self.jobs.lock().await.get(id).cloned())
    }

    async fn update(&self, id: &JobId, update: &JobUpdate) -> QueueResult<Job> {
        let mut jobs = self.jobs.lock().await;
        let stored = jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::not_found(id.as_str()))?;

        let mut next = stored.clone();
        next.apply(update)?;
        *stored = next.clone();
        Ok(next)
    }
}

#[async_trait]
impl WorkQueue for MemoryBackend {
    async fn enqueue(&self, id: &JobId) -> QueueResult<()> {
        self.queue.lock().await.push_back(id.clone());
        Ok(())
    }

    async fn dequeue(&self) -> QueueResult<Option<JobId>> {
        Ok(self.queue.lock().await.pop_front())
    }

    async fn len(&self) -> QueueResult<usize> {
        Ok(self.queue.lock().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipper_models::{CreateJobRequest, ExportSize, JobStatus};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn job() -> Job {
        Job::queued(&CreateJobRequest {
            source_key: "uploads/src.mp4".to_string(),
            start_time: 0.0,
            duration: 5.0,
            size: ExportSize::Small,
            remove_audio: false,
        })
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let backend = MemoryBackend::new();
        let job = job();
        backend.create(&job).await.unwrap();

        let first = backend.get(&job.id).await.unwrap().unwrap();
        let second = backend.get(&job.id).await.unwrap().unwrap();
        assert_eq!(first, job);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let backend = MemoryBackend::new();
        let job = job();
        backend.create(&job).await.unwrap();
        let err = backend.create(&job).await.unwrap_err();
        assert!(matches!(err, QueueError::DuplicateId(_)));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend
            .update(&JobId::new(), &JobUpdate::progress(5))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_terminal_record_unchanged_after_rejected_update() {
        let backend = MemoryBackend::new();
        let job = job();
        backend.create(&job).await.unwrap();
        backend
            .update(&job.id, &JobUpdate::processing_started())
            .await
            .unwrap();
        backend
            .update(&job.id, &JobUpdate::completed("results/a.mp4"))
            .await
            .unwrap();

        let err = backend
            .update(&job.id, &JobUpdate::failed("late"))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidTransition(_)));

        let stored = backend.get(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert!(stored.error.is_none());
    }

    #[tokio::test]
    async fn test_fifo_and_empty_sentinel() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.dequeue().await.unwrap(), None);
        assert_eq!(backend.dequeue().await.unwrap(), None);

        let ids: Vec<JobId> = (0..5).map(|_| JobId::new()).collect();
        for id in &ids {
            backend.enqueue(id).await.unwrap();
        }
        assert_eq!(backend.len().await.unwrap(), 5);

        for id in &ids {
            assert_eq!(backend.dequeue().await.unwrap().as_ref(), Some(id));
        }
        assert_eq!(backend.dequeue().await.unwrap(), None);
        assert!(backend.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_consumers_never_share_an_id() {
        let backend = Arc::new(MemoryBackend::new());
        for _ in 0..200 {
            backend.enqueue(&JobId::new()).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let backend = Arc::clone(&backend);
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(id) = backend.dequeue().await.unwrap() {
                    seen.push(id);
                }
                seen
            }));
        }

        let mut all = HashSet::new();
        let mut total = 0;
        for handle in handles {
            for id in handle.await.unwrap() {
                total += 1;
                all.insert(id);
            }
        }
        assert_eq!(total, 200);
        assert_eq!(all.len(), 200);
    }
}
