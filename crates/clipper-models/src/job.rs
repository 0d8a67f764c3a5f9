//! Job record, status state machine and partial updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::request::CreateJobRequest;
use crate::ExportSize;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting in the queue
    #[default]
    Queued,
    /// Job is being worked by a processor
    Processing,
    /// Job finished and its result was uploaded
    Completed,
    /// Job failed; `error` holds the cause
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a legal step.
    ///
    /// Staying in a non-terminal state is allowed so progress-only
    /// updates can restate the current status.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Queued, JobStatus::Queued | JobStatus::Processing) => true,
            (
                JobStatus::Processing,
                JobStatus::Processing | JobStatus::Completed | JobStatus::Failed,
            ) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A clip export job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Current status
    pub status: JobStatus,

    /// Progress (0-100)
    #[serde(default)]
    pub progress: u8,

    /// Blob store key of the uploaded source video
    pub source_key: String,

    /// Trim start in seconds
    pub start_time: f64,

    /// Trim length in seconds
    pub duration: f64,

    /// Output resolution
    pub size: ExportSize,

    /// Drop the audio stream from the output
    pub remove_audio: bool,

    /// Blob store key of the exported clip (completed only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_key: Option<String>,

    /// Time-limited retrieval URL, resolved at read time and never stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,

    /// Failure cause (failed only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Creation timestamp
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a queued job from a validated submission.
    pub fn queued(request: &CreateJobRequest) -> Self {
        let now = now_millis();

        Self {
            id: JobId::new(),
            status: JobStatus::Queued,
            progress: 0,
            source_key: request.source_key.clone(),
            start_time: request.start_time,
            duration: request.duration,
            size: request.size,
            remove_audio: request.remove_audio,
            result_key: None,
            result_url: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// End of the trim window in seconds.
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Merge a partial update into this record.
    ///
    /// Terminal records are read-only. While processing, progress never
    /// moves backwards; a lower value is ignored rather than rejected since
    /// progress writes are best-effort.
    pub fn apply(&mut self, update: &JobUpdate) -> ModelResult<()> {
        if self.status.is_terminal() {
            return Err(ModelError::Terminal(self.status));
        }

        let mut entered_new_state = false;
        if let Some(next) = update.status {
            if !self.status.can_transition_to(next) {
                return Err(ModelError::InvalidTransition {
                    from: self.status,
                    to: next,
                });
            }
            entered_new_state = next != self.status;
            self.status = next;
        }

        if let Some(progress) = update.progress {
            let progress = progress.min(100);
            if entered_new_state || progress >= self.progress {
                self.progress = progress;
            }
        }

        if let Some(key) = &update.result_key {
            self.result_key = Some(key.clone());
        }
        if let Some(error) = &update.error {
            self.error = Some(error.clone());
        }

        self.updated_at = now_millis();
        Ok(())
    }
}

/// Partial update applied to a stored job.
///
/// Only the mutable fields of a job can be expressed, so write-once
/// fields are protected by construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobUpdate {
    /// `queued -> processing` with progress reset to 0.
    pub fn processing_started() -> Self {
        Self {
            status: Some(JobStatus::Processing),
            progress: Some(0),
            ..Default::default()
        }
    }

    /// Progress-only update.
    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress.min(100)),
            ..Default::default()
        }
    }

    /// `processing -> completed` with the uploaded result key.
    pub fn completed(result_key: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            result_key: Some(result_key.into()),
            error: None,
        }
    }

    /// `processing -> failed` with a human-readable cause.
    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        let error = if error.trim().is_empty() {
            "Unknown error".to_string()
        } else {
            error
        };

        Self {
            status: Some(JobStatus::Failed),
            error: Some(error),
            ..Default::default()
        }
    }
}

/// Current time truncated to milliseconds, matching the wire precision.
fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
