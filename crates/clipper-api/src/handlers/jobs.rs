//! Job submission and status handlers.

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use tracing::{info, warn};

use clipper_models::{CreateJobRequest, CreateJobResponse, Job, JobId, JobStatus};
use clipper_queue::submit_job;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Lifetime of the retrieval URL attached to a completed job.
pub const RESULT_URL_TTL: Duration = Duration::from_secs(60 * 60);

/// `POST /api/jobs`: validate, persist and enqueue a new export job.
pub async fn create_job(
    State(state): State<AppState>,
    payload: Result<Json<CreateJobRequest>, JsonRejection>,
) -> ApiResult<Json<CreateJobResponse>> {
    let Json(request) = payload?;
    let request = request.validated()?;

    let job = Job::queued(&request);
    submit_job(
        state.backend.records.as_ref(),
        state.backend.queue.as_ref(),
        &job,
    )
    .await?;

    metrics::record_job_submitted(job.size.as_str());
    if let Ok(depth) = state.backend.queue.len().await {
        metrics::set_queue_length(depth as u64);
    }

    info!(
        job_id = %job.id,
        source_key = %job.source_key,
        size = %job.size,
        "Job submitted"
    );

    Ok(Json(CreateJobResponse { job_id: job.id }))
}

/// `GET /api/jobs/:job_id`: current record, with `resultUrl` once completed.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    let id = JobId::from_string(job_id);
    let mut job = state
        .backend
        .records
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {}", id)))?;

    if job.status == JobStatus::Completed {
        if let Some(key) = &job.result_key {
            match state.blobs.retrieval_url(key, RESULT_URL_TTL).await {
                Ok(url) => job.result_url = Some(url),
                Err(e) => {
                    warn!(job_id = %id, "Failed to resolve result URL: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    Ok(Json(job))
}
