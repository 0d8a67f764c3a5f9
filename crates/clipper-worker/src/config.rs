//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Lower bound for poll and backoff intervals.
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);
/// Upper bound for poll and backoff intervals.
pub const MAX_INTERVAL: Duration = Duration::from_secs(60);

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Work directory for temporary files
    pub work_dir: PathBuf,
    /// Sleep between polls when the queue is empty
    pub poll_interval: Duration,
    /// Sleep after a queue or store fault
    pub error_backoff: Duration,
    /// Smallest progress increase written for transcode ticks
    pub progress_min_step: u8,
    /// Consecutive poll failures logged before suppression
    pub max_logged_failures: u32,
    /// Port for the Prometheus scrape endpoint; disabled when unset
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("clipper"),
            poll_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(5),
            progress_min_step: 1,
            max_logged_failures: 3,
            metrics_port: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            poll_interval: clamp_interval(Duration::from_millis(
                std::env::var("WORKER_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            )),
            error_backoff: clamp_interval(Duration::from_millis(
                std::env::var("WORKER_ERROR_BACKOFF_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5000),
            )),
            progress_min_step: std::env::var("WORKER_PROGRESS_MIN_STEP")
                .ok()
                .and_then(|s| s.parse::<u8>().ok())
                .unwrap_or(1)
                .clamp(1, 70),
            max_logged_failures: std::env::var("WORKER_MAX_LOGGED_FAILURES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            metrics_port: std::env::var("WORKER_METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    /// Apply the interval bounds to values set in code.
    pub fn normalized(mut self) -> Self {
        self.poll_interval = clamp_interval(self.poll_interval);
        self.error_backoff = clamp_interval(self.error_backoff);
        self.progress_min_step = self.progress_min_step.max(1);
        self
    }
}

fn clamp_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_INTERVAL, MAX_INTERVAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intervals_are_clamped() {
        let config = WorkerConfig {
            poll_interval: Duration::from_millis(1),
            error_backoff: Duration::from_secs(3600),
            progress_min_step: 0,
            ..Default::default()
        }
        .normalized();

        assert_eq!(config.poll_interval, MIN_INTERVAL);
        assert_eq!(config.error_backoff, MAX_INTERVAL);
        assert_eq!(config.progress_min_step, 1);
    }

    #[test]
    fn test_defaults_within_bounds() {
        let config = WorkerConfig::default();
        assert_eq!(config.clone().normalized().poll_interval, config.poll_interval);
        assert_eq!(config.clone().normalized().error_backoff, config.error_backoff);
    }
}
