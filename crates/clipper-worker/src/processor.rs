//! Drives one job from `queued` to a terminal state.
//!
//! Phases and the progress written at each boundary:
//! download (0 -> 10), transcode (20 -> 90, ticks mapped by
//! `20 + fraction * 70`), upload (90 -> 100 on completion).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clipper_media::{ProgressFn, TranscodeRequest, Transcoder};
use clipper_models::{Job, JobId, JobStatus, JobUpdate};
use clipper_queue::JobRecordStore;
use clipper_storage::BlobStore;
use tokio::sync::watch;
use tracing::Instrument;

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;

/// Progress written once the source is local.
pub const DOWNLOADED_PROGRESS: u8 = 10;
/// Progress written when the engine starts.
pub const TRANSCODE_START_PROGRESS: u8 = 20;
/// Progress written when the engine finishes.
pub const TRANSCODED_PROGRESS: u8 = 90;

const TRANSCODE_SPAN: f64 = (TRANSCODED_PROGRESS - TRANSCODE_START_PROGRESS) as f64;

/// Map an engine fraction in `[0, 1]` into the transcode band.
pub fn map_transcode_progress(fraction: f64) -> u8 {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    (TRANSCODE_START_PROGRESS as f64 + fraction * TRANSCODE_SPAN).floor() as u8
}

/// Blob key the exported clip is uploaded to.
pub fn result_key_for(id: &JobId) -> String {
    format!("results/{}.mp4", id)
}

/// What happened to a dequeued id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed,
    /// No record, or the record was not queued
    Skipped,
}

/// Writes best-effort progress, only ever increasing.
struct ProgressReporter<'a> {
    records: &'a dyn JobRecordStore,
    id: &'a JobId,
    logger: &'a JobLogger,
    written: u8,
    min_step: u8,
}

impl ProgressReporter<'_> {
    /// Write a phase boundary if it moves progress forward.
    async fn boundary(&mut self, progress: u8) {
        if progress > self.written {
            self.write(progress).await;
        }
    }

    /// Write an engine tick if it moves progress by at least `min_step`.
    async fn tick(&mut self, progress: u8) {
        if progress > self.written && progress - self.written >= self.min_step {
            self.write(progress).await;
        }
    }

    async fn write(&mut self, progress: u8) {
        match self
            .records
            .update(self.id, &JobUpdate::progress(progress))
            .await
        {
            Ok(_) => self.written = progress,
            Err(e) => self
                .logger
                .log_warning(&format!("progress write to {}% failed: {}", progress, e)),
        }
    }
}

/// Runs jobs against a record store, a blob store and a transcoder.
#[derive(Clone)]
pub struct JobProcessor {
    records: Arc<dyn JobRecordStore>,
    blobs: Arc<dyn BlobStore>,
    transcoder: Arc<dyn Transcoder>,
    work_dir: PathBuf,
    progress_min_step: u8,
}

impl JobProcessor {
    pub fn new(
        records: Arc<dyn JobRecordStore>,
        blobs: Arc<dyn BlobStore>,
        transcoder: Arc<dyn Transcoder>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            records,
            blobs,
            transcoder,
            work_dir: work_dir.into(),
            progress_min_step: 1,
        }
    }

    pub fn with_progress_min_step(mut self, step: u8) -> Self {
        self.progress_min_step = step.max(1);
        self
    }

    /// Process one dequeued id.
    ///
    /// Phase failures end as a `failed` record and an `Ok` outcome. An
    /// `Err` means the store could not be read or the job could not be
    /// claimed; the record is still `queued` and the caller requeues it.
    pub async fn process(&self, id: &JobId) -> WorkerResult<JobOutcome> {
        let logger = JobLogger::new(id, "clip_export");
        let span = logger.create_span();
        self.process_inner(id, &logger).instrument(span).await
    }

    async fn process_inner(&self, id: &JobId, logger: &JobLogger) -> WorkerResult<JobOutcome> {
        let job = match self.records.get(id).await? {
            Some(job) => job,
            None => {
                logger.log_warning("dequeued id has no record, skipping");
                metrics::record_job_skipped("missing");
                return Ok(JobOutcome::Skipped);
            }
        };

        if job.status != JobStatus::Queued {
            logger.log_warning(&format!("job is {}, not queued; skipping", job.status));
            metrics::record_job_skipped("not_queued");
            return Ok(JobOutcome::Skipped);
        }

        self.records
            .update(id, &JobUpdate::processing_started())
            .await?;
        logger.log_start(&format!(
            "{} [{:.3}s +{:.3}s] -> {}",
            job.source_key, job.start_time, job.duration, job.size
        ));

        let input = self.work_dir.join(format!("{}-input.mp4", id));
        let output = self.work_dir.join(format!("{}-output.mp4", id));

        let result = self.run_phases(&job, &input, &output, logger).await;

        remove_temp_file(&input, logger).await;
        remove_temp_file(&output, logger).await;

        match result {
            Ok(result_key) => self.finish_completed(&job, result_key, logger).await,
            Err((phase, err)) => {
                self.finish_failed(id, phase, &err.to_string(), logger).await;
                Ok(JobOutcome::Failed)
            }
        }
    }

    async fn finish_completed(
        &self,
        job: &Job,
        result_key: String,
        logger: &JobLogger,
    ) -> WorkerResult<JobOutcome> {
        match self
            .records
            .update(&job.id, &JobUpdate::completed(result_key.clone()))
            .await
        {
            Ok(_) => {
                metrics::record_job_completed(job.size.as_str());
                logger.log_completion(&result_key);
                Ok(JobOutcome::Completed)
            }
            Err(e) => {
                let message = format!("Failed to record completion: {}", e);
                self.finish_failed(&job.id, "complete", &message, logger)
                    .await;
                Ok(JobOutcome::Failed)
            }
        }
    }

    async fn finish_failed(&self, id: &JobId, phase: &str, message: &str, logger: &JobLogger) {
        logger.log_error(&format!("{} phase: {}", phase, message));
        metrics::record_job_failed(phase);

        if let Err(e) = self.records.update(id, &JobUpdate::failed(message)).await {
            logger.log_error(&format!("could not record failure: {}", e));
        }
    }

    async fn run_phases(
        &self,
        job: &Job,
        input: &Path,
        output: &Path,
        logger: &JobLogger,
    ) -> Result<String, (&'static str, WorkerError)> {
        let mut progress = ProgressReporter {
            records: self.records.as_ref(),
            id: &job.id,
            logger,
            written: 0,
            min_step: self.progress_min_step,
        };

        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| ("download", WorkerError::from(e)))?;

        // Download
        let started = Instant::now();
        self.blobs
            .download(&job.source_key, input)
            .await
            .map_err(|e| ("download", WorkerError::download_failed(e.to_string())))?;
        metrics::record_download_duration(started.elapsed().as_secs_f64());
        progress.boundary(DOWNLOADED_PROGRESS).await;
        logger.log_progress("source downloaded");

        // Transcode
        progress.boundary(TRANSCODE_START_PROGRESS).await;
        let request = TranscodeRequest {
            source_path: input.to_path_buf(),
            dest_path: output.to_path_buf(),
            start_time: job.start_time,
            duration: job.duration,
            width: job.size.width(),
            height: job.size.height(),
            remove_audio: job.remove_audio,
        };

        let started = Instant::now();
        self.transcode_with_progress(&request, &mut progress)
            .await
            .map_err(|e| ("transcode", WorkerError::transcode_failed(e.to_string())))?;
        metrics::record_transcode_duration(job.size.as_str(), started.elapsed().as_secs_f64());
        progress.boundary(TRANSCODED_PROGRESS).await;
        logger.log_progress("clip transcoded");

        // Upload
        let result_key = result_key_for(&job.id);
        let started = Instant::now();
        self.blobs
            .upload(output, &result_key)
            .await
            .map_err(|e| ("upload", WorkerError::upload_failed(e.to_string())))?;
        metrics::record_upload_duration(started.elapsed().as_secs_f64());

        Ok(result_key)
    }

    /// Run the transcoder while writing its coalesced progress ticks.
    ///
    /// The engine callback only publishes to a watch channel; ticks that
    /// arrive while a write is in flight collapse into the latest value.
    async fn transcode_with_progress(
        &self,
        request: &TranscodeRequest,
        progress: &mut ProgressReporter<'_>,
    ) -> clipper_media::MediaResult<()> {
        let (tx, mut rx) = watch::channel(TRANSCODE_START_PROGRESS);
        let on_progress: ProgressFn = Arc::new(move |fraction| {
            let mapped = map_transcode_progress(fraction);
            tx.send_if_modified(|current| {
                if mapped > *current {
                    *current = mapped;
                    true
                } else {
                    false
                }
            });
        });

        let transcode = self.transcoder.transcode(request, on_progress);
        tokio::pin!(transcode);

        loop {
            tokio::select! {
                result = &mut transcode => return result,
                Ok(()) = rx.changed() => {
                    let value = *rx.borrow_and_update();
                    progress.tick(value).await;
                }
            }
        }
    }
}

async fn remove_temp_file(path: &Path, logger: &JobLogger) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => logger.log_warning(&format!(
            "failed to remove temp file {}: {}",
            path.display(),
            e
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcode_band_mapping() {
        assert_eq!(map_transcode_progress(0.0), 20);
        assert_eq!(map_transcode_progress(0.5), 55);
        assert_eq!(map_transcode_progress(1.0), 90);
        assert_eq!(map_transcode_progress(7.0), 90);
        assert_eq!(map_transcode_progress(-1.0), 20);
        assert_eq!(map_transcode_progress(f64::NAN), 20);
    }

    #[test]
    fn test_result_key() {
        assert_eq!(
            result_key_for(&JobId::from_string("abc")),
            "results/abc.mp4"
        );
    }
}
