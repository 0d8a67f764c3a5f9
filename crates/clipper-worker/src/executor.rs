//! Worker loop.

use std::sync::Arc;

use clipper_models::JobId;
use clipper_queue::WorkQueue;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::metrics;
use crate::processor::{JobOutcome, JobProcessor};
use crate::retry::FailureTracker;

/// Result of a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The queue was empty.
    Idle,
    /// An id was dequeued and handled.
    Processed(JobOutcome),
}

/// Polls the queue and processes one job at a time.
///
/// Shutdown is observed between jobs only; a job in flight always runs to
/// a terminal state first.
pub struct WorkerLoop {
    config: WorkerConfig,
    queue: Arc<dyn WorkQueue>,
    processor: JobProcessor,
    shutdown: watch::Sender<bool>,
}

impl WorkerLoop {
    pub fn new(config: WorkerConfig, queue: Arc<dyn WorkQueue>, processor: JobProcessor) -> Self {
        let config = config.normalized();
        let processor = processor.with_progress_min_step(config.progress_min_step);
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            queue,
            processor,
            shutdown,
        }
    }

    /// Ask the loop to stop after the current job.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Dequeue and process at most one job.
    pub async fn poll_once(&self) -> WorkerResult<PollOutcome> {
        match self.queue.dequeue().await? {
            None => Ok(PollOutcome::Idle),
            Some(id) => {
                debug!(job_id = %id, "Dequeued job");
                match self.processor.process(&id).await {
                    Ok(outcome) => Ok(PollOutcome::Processed(outcome)),
                    Err(e) => {
                        self.requeue(&id).await;
                        Err(e)
                    }
                }
            }
        }
    }

    /// Put back an id whose job could not be claimed.
    ///
    /// The dequeue already removed it, so without this the record would
    /// stay `queued` with nothing left to pick it up.
    async fn requeue(&self, id: &JobId) {
        match self.queue.enqueue(id).await {
            Ok(()) => warn!(job_id = %id, "Job could not be claimed; requeued"),
            Err(e) => error!(job_id = %id, "Job could not be claimed or requeued: {}", e),
        }
    }

    /// Run until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            work_dir = %self.config.work_dir.display(),
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            error_backoff_ms = self.config.error_backoff.as_millis() as u64,
            "Starting worker loop"
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut failures = FailureTracker::new(self.config.max_logged_failures);

        loop {
            if *shutdown_rx.borrow_and_update() {
                break;
            }

            let delay = match self.poll_once().await {
                Ok(PollOutcome::Processed(_)) => {
                    failures.record_success();
                    None
                }
                Ok(PollOutcome::Idle) => {
                    failures.record_success();
                    Some(self.config.poll_interval)
                }
                Err(e) => {
                    metrics::record_poll_error();
                    if failures.record_failure() {
                        error!("Error polling queue: {}", e);
                    }
                    Some(self.config.error_backoff)
                }
            };

            if let Some(delay) = delay {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_rx.changed() => {}
                }
            }
        }

        info!("Worker loop stopped");
        Ok(())
    }
}
