//! Upload URL issuance and the local blob routes.
//!
//! The local routes stand in for a bucket when `STORAGE_BACKEND=local`;
//! against R2 they answer 404 so clients use the presigned URLs instead.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use clipper_storage::{validate_key, VIDEO_CONTENT_TYPE};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Lifetime of an issued upload URL.
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Default, Deserialize)]
pub struct UploadUrlRequest {
    /// Client-side file name, informational only
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlResponse {
    pub upload_url: String,
    pub key: String,
}

/// `POST /api/upload-url`: reserve a fresh source key and a URL to PUT it to.
///
/// The body is optional.
pub async fn create_upload_url(
    State(state): State<AppState>,
    body: Option<Json<UploadUrlRequest>>,
) -> ApiResult<Json<UploadUrlResponse>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let key = format!("uploads/{}.mp4", Uuid::new_v4());
    let upload_url = state.blobs.upload_url(&key, UPLOAD_URL_TTL).await?;

    info!(
        key = %key,
        backend = state.blobs.name(),
        filename = request.filename.as_deref().unwrap_or("-"),
        "Issued upload URL"
    );

    Ok(Json(UploadUrlResponse { upload_url, key }))
}

#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub key: String,
}

/// `PUT /api/storage/upload?key=`: store the raw body under `key`.
pub async fn upload_local(
    State(state): State<AppState>,
    query: Result<Query<KeyQuery>, QueryRejection>,
    body: Bytes,
) -> ApiResult<Json<UploadResponse>> {
    require_local(&state)?;
    let Query(KeyQuery { key }) = query?;
    validate_key(&key)?;

    if body.is_empty() {
        return Err(ApiError::bad_request("empty upload body"));
    }

    state.blobs.upload_bytes(body.to_vec(), &key).await?;

    Ok(Json(UploadResponse { success: true, key }))
}

/// `GET /api/storage/download?key=`: serve a stored blob as an attachment.
pub async fn download_local(
    State(state): State<AppState>,
    query: Result<Query<KeyQuery>, QueryRejection>,
) -> ApiResult<Response> {
    require_local(&state)?;
    let Query(KeyQuery { key }) = query?;
    validate_key(&key)?;

    let data = state.blobs.download_bytes(&key).await?;
    let filename = key.rsplit('/').next().unwrap_or(key.as_str());

    Ok((
        [
            (header::CONTENT_TYPE, VIDEO_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename.replace('"', "")),
            ),
        ],
        Body::from(data),
    )
        .into_response())
}

fn require_local(state: &AppState) -> ApiResult<()> {
    if state.serves_local_blobs() {
        Ok(())
    } else {
        Err(ApiError::not_found("local storage routes are disabled"))
    }
}
