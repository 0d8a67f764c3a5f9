//! Worker metrics.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_COMPLETED_TOTAL: &str = "clipper_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "clipper_jobs_failed_total";
    pub const JOBS_SKIPPED_TOTAL: &str = "clipper_jobs_skipped_total";
    pub const TRANSCODE_DURATION_SECONDS: &str = "clipper_transcode_duration_seconds";
    pub const DOWNLOAD_DURATION_SECONDS: &str = "clipper_download_duration_seconds";
    pub const UPLOAD_DURATION_SECONDS: &str = "clipper_upload_duration_seconds";
    pub const QUEUE_POLL_ERRORS_TOTAL: &str = "clipper_queue_poll_errors_total";
}

/// Serve Prometheus metrics on `0.0.0.0:port`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .install()
}

pub fn record_job_completed(size: &str) {
    let labels = [("size", size.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
}

pub fn record_job_failed(phase: &str) {
    let labels = [("phase", phase.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_job_skipped(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::JOBS_SKIPPED_TOTAL, &labels).increment(1);
}

pub fn record_transcode_duration(size: &str, duration_secs: f64) {
    let labels = [("size", size.to_string())];
    histogram!(names::TRANSCODE_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_download_duration(duration_secs: f64) {
    histogram!(names::DOWNLOAD_DURATION_SECONDS).record(duration_secs);
}

pub fn record_upload_duration(duration_secs: f64) {
    histogram!(names::UPLOAD_DURATION_SECONDS).record(duration_secs);
}

pub fn record_poll_error() {
    counter!(names::QUEUE_POLL_ERRORS_TOTAL).increment(1);
}
