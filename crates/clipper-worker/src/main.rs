//! Clip export worker binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipper_media::{check_ffmpeg, FfmpegTranscoder};
use clipper_models::EncodingConfig;
use clipper_queue::{BackendConfig, JobBackend};
use clipper_storage::{connect_blob_store, StorageConfig};
use clipper_worker::{JobProcessor, WorkerConfig, WorkerLoop};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting clipper-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        match clipper_worker::metrics::init_metrics(port) {
            Ok(()) => info!("Metrics listening on port {}", port),
            Err(e) => warn!("Failed to start metrics exporter: {}", e),
        }
    }

    match check_ffmpeg() {
        Ok(path) => info!("Using FFmpeg at {}", path.display()),
        Err(e) => warn!("{}; every job will fail until it is installed", e),
    }

    let backend_config = match BackendConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid backend configuration: {}", e);
            std::process::exit(1);
        }
    };

    let backend = match JobBackend::connect(&backend_config).await {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to connect job backend: {}", e);
            std::process::exit(1);
        }
    };

    let blobs = match StorageConfig::from_env().and_then(|c| connect_blob_store(&c)) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create blob store: {}", e);
            std::process::exit(1);
        }
    };

    let processor = JobProcessor::new(
        backend.records.clone(),
        blobs,
        Arc::new(FfmpegTranscoder::new(EncodingConfig::default())),
        config.work_dir.clone(),
    );
    let worker = Arc::new(WorkerLoop::new(config, backend.queue.clone(), processor));

    // Stop polling on Ctrl-C; the current job finishes first
    let signal_worker = Arc::clone(&worker);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_worker.shutdown();
        }
    });

    if let Err(e) = worker.run().await {
        error!("Worker error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("clipper=info,clipper_worker=info,clipper_media=info,clipper_queue=info,clipper_storage=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}
