//! Job submission request and response types.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ModelResult;
use crate::{ExportSize, JobId};

/// Shortest clip that can be exported, in seconds.
pub const MIN_CLIP_DURATION_SECS: f64 = 3.0;
/// Longest clip that can be exported, in seconds.
pub const MAX_CLIP_DURATION_SECS: f64 = 6.0;

/// Body of a job submission.
///
/// `size` is checked against the fixed enumeration during deserialization.
/// The trim window is not checked against the source length; callers own
/// `start_time + duration <= source duration`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    #[validate(length(min = 1, message = "sourceKey must not be empty"))]
    pub source_key: String,

    #[validate(range(min = 0.0, message = "startTime must be >= 0"))]
    pub start_time: f64,

    #[validate(range(
        min = MIN_CLIP_DURATION_SECS,
        max = MAX_CLIP_DURATION_SECS,
        message = "duration must be between 3 and 6 seconds"
    ))]
    pub duration: f64,

    pub size: ExportSize,

    pub remove_audio: bool,
}

impl CreateJobRequest {
    /// Run field validation, returning a single readable error.
    pub fn validated(self) -> ModelResult<Self> {
        self.validate()?;
        if !self.start_time.is_finite() || !self.duration.is_finite() {
            return Err(crate::ModelError::validation("trim window must be finite"));
        }
        Ok(self)
    }
}

/// Response to a successful submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job_id: JobId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> CreateJobRequest {
        CreateJobRequest {
            source_key: "uploads/a.mp4".to_string(),
            start_time: 2.0,
            duration: 4.0,
            size: ExportSize::Medium,
            remove_audio: true,
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(valid().validated().is_ok());
    }

    #[test]
    fn test_duration_bounds() {
        for duration in [3.0, 4.5, 6.0] {
            let req = CreateJobRequest { duration, ..valid() };
            assert!(req.validated().is_ok(), "duration {duration} should pass");
        }
        for duration in [2.99, 6.01, 0.0] {
            let req = CreateJobRequest { duration, ..valid() };
            assert!(req.validated().is_err(), "duration {duration} should fail");
        }
    }

    #[test]
    fn test_negative_start_rejected() {
        let req = CreateJobRequest {
            start_time: -1.0,
            ..valid()
        };
        assert!(req.validated().is_err());
    }

    #[test]
    fn test_empty_source_key_rejected() {
        let req = CreateJobRequest {
            source_key: String::new(),
            ..valid()
        };
        assert!(req.validated().is_err());
    }

    #[test]
    fn test_unknown_size_rejected_on_parse() {
        let body = r#"{"sourceKey":"uploads/a.mp4","startTime":0,"duration":4,"size":"1280x720","removeAudio":false}"#;
        assert!(serde_json::from_str::<CreateJobRequest>(body).is_err());

        let body = r#"{"sourceKey":"uploads/a.mp4","startTime":0,"duration":4,"size":"630x354","removeAudio":false}"#;
        let req: CreateJobRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.size, ExportSize::Small);
    }
}
