//! Router tests against the in-memory backend and a local blob store.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use clipper_api::{create_router, ApiConfig, AppState};
use clipper_models::{CreateJobRequest, ExportSize, Job, JobUpdate};
use clipper_queue::JobBackend;
use clipper_storage::{BlobStore, LocalBlobStore};

const BASE_URL: &str = "http://localhost:8000";

struct TestApp {
    _dir: tempfile::TempDir,
    router: Router,
    backend: JobBackend,
    blobs: Arc<LocalBlobStore>,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(ApiConfig::default())
    }

    fn with_config(config: ApiConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let backend = JobBackend::memory();
        let blobs = Arc::new(LocalBlobStore::new(dir.path(), BASE_URL));
        let state = AppState::new(config, backend.clone(), blobs.clone());

        Self {
            _dir: dir,
            router: create_router(state, None),
            backend,
            blobs,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    async fn send_json(&self, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, _, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }
}

fn valid_body() -> Value {
    json!({
        "sourceKey": "uploads/source.mp4",
        "startTime": 1.5,
        "duration": 4,
        "size": "1920x1080",
        "removeAudio": false
    })
}

#[tokio::test]
async fn submitted_job_is_queued_and_readable() {
    let app = TestApp::new();

    let (status, body) = app.send_json(Method::POST, "/api/jobs", valid_body()).await;
    assert_eq!(status, StatusCode::OK);
    let job_id = body["jobId"].as_str().unwrap().to_string();

    assert_eq!(app.backend.queue.len().await.unwrap(), 1);

    let (status, job) = app.get_json(&format!("/api/jobs/{}", job_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["id"], job_id.as_str());
    assert_eq!(job["status"], "queued");
    assert_eq!(job["progress"], 0);
    assert_eq!(job["size"], "1920x1080");
    assert_eq!(job["startTime"], 1.5);
    assert!(job.get("resultUrl").is_none());
    assert!(job.get("error").is_none());
}

#[tokio::test]
async fn invalid_submissions_are_rejected_without_side_effects() {
    let app = TestApp::new();

    let mut too_long = valid_body();
    too_long["duration"] = json!(6.5);
    let mut bad_size = valid_body();
    bad_size["size"] = json!("1280x720");
    let mut negative_start = valid_body();
    negative_start["startTime"] = json!(-1);
    let mut missing_key = valid_body();
    missing_key["sourceKey"] = json!("");

    for body in [too_long, bad_size, negative_start, missing_key] {
        let (status, response) = app.send_json(Method::POST, "/api/jobs", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(response["error"].is_string());
    }

    assert_eq!(app.backend.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let app = TestApp::new();

    let (status, body) = app.get_json("/api/jobs/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("does-not-exist"));
}

#[tokio::test]
async fn completed_job_carries_a_retrieval_url() {
    let app = TestApp::new();
    let job = Job::queued(&CreateJobRequest {
        source_key: "uploads/source.mp4".to_string(),
        start_time: 0.0,
        duration: 3.0,
        size: ExportSize::Small,
        remove_audio: true,
    });
    let records = &app.backend.records;
    records.create(&job).await.unwrap();
    records
        .update(&job.id, &JobUpdate::processing_started())
        .await
        .unwrap();
    let result_key = format!("results/{}.mp4", job.id);
    records
        .update(&job.id, &JobUpdate::completed(result_key.clone()))
        .await
        .unwrap();

    let (status, body) = app.get_json(&format!("/api/jobs/{}", job.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["progress"], 100);
    assert_eq!(body["resultKey"], result_key.as_str());

    let url = body["resultUrl"].as_str().unwrap();
    assert!(url.starts_with("http://localhost:8000/api/storage/download?key="));
    assert!(url.contains("results%2F"));

    // Never persisted
    let stored = records.get(&job.id).await.unwrap().unwrap();
    assert!(stored.result_url.is_none());
}

#[tokio::test]
async fn upload_url_round_trips_through_local_routes() {
    let app = TestApp::new();

    let (status, body) = app
        .send_json(Method::POST, "/api/upload-url", json!({ "filename": "holiday.mov" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let key = body["key"].as_str().unwrap().to_string();
    assert!(key.starts_with("uploads/") && key.ends_with(".mp4"));

    let upload_url = body["uploadUrl"].as_str().unwrap();
    let path = upload_url.strip_prefix(BASE_URL).unwrap();
    assert!(path.starts_with("/api/storage/upload?key="));

    let request = Request::builder()
        .method(Method::PUT)
        .uri(path)
        .body(Body::from("source bytes"))
        .unwrap();
    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.blobs.exists(&key).await.unwrap());

    let download = path.replace("/api/storage/upload", "/api/storage/download");
    let request = Request::builder().uri(download).body(Body::empty()).unwrap();
    let (status, headers, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"source bytes");
    assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .starts_with("attachment; filename="));
}

fn upload_request(key: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::PUT)
        .uri(format!("/api/storage/upload?key={}", key))
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn local_upload_accepts_bodies_up_to_the_configured_limit() {
    let app = TestApp::new();
    let video = vec![7u8; 3 * 1024 * 1024];

    let (status, _, _) = app.send(upload_request("uploads%2Flarge.mp4", video.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.blobs.download_bytes("uploads/large.mp4").await.unwrap(), video);
}

#[tokio::test]
async fn local_upload_over_the_limit_is_rejected() {
    let app = TestApp::with_config(ApiConfig {
        max_body_size: 1024,
        ..Default::default()
    });

    let (status, _, _) = app.send(upload_request("uploads%2Fbig.mp4", vec![0u8; 4096])).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(!app.blobs.exists("uploads/big.mp4").await.unwrap());
}

#[tokio::test]
async fn upload_url_accepts_an_empty_body() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/upload-url")
        .body(Body::empty())
        .unwrap();

    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["key"].as_str().unwrap().starts_with("uploads/"));
}

#[tokio::test]
async fn local_download_rejects_missing_and_unsafe_keys() {
    let app = TestApp::new();

    let (status, _) = app.get_json("/api/storage/download?key=uploads%2Fmissing.mp4").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get_json("/api/storage/download?key=..%2Fsecret").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get_json("/api/storage/download").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn probes_and_response_headers() {
    let app = TestApp::new();

    let (status, body) = app.get_json("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let request = Request::builder()
        .uri("/ready")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["queue"]["status"], "ok");
    assert_eq!(headers["x-request-id"], "req-123");
    assert_eq!(headers["x-content-type-options"], "nosniff");

    let (status, _) = app.get_json("/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
