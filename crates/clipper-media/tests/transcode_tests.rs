//! Transcoder behaviour against stand-in engines and, optionally, real FFmpeg.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use clipper_media::{FfmpegRunner, FfmpegTranscoder, MediaError, TranscodeRequest, Transcoder};

fn write_engine(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-ffmpeg");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn request(dir: &Path) -> TranscodeRequest {
    TranscodeRequest {
        source_path: dir.join("job-input.mp4"),
        dest_path: dir.join("job-output.mp4"),
        start_time: 1.0,
        duration: 4.0,
        width: 630,
        height: 354,
        remove_audio: false,
    }
}

fn recorder() -> (Arc<Mutex<Vec<f64>>>, clipper_media::ProgressFn) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, Arc::new(move |f| sink.lock().unwrap().push(f)))
}

#[tokio::test]
async fn progress_is_reported_in_order_and_output_checked() {
    let dir = tempfile::tempdir().unwrap();
    let engine = write_engine(
        dir.path(),
        r#"for last; do :; done
echo "out_time_us=1000000" >&2
echo "progress=continue" >&2
echo "out_time_us=500000" >&2
echo "progress=continue" >&2
echo "out_time_us=3000000" >&2
echo "progress=continue" >&2
: > "$last"
exit 0"#,
    );

    let transcoder =
        FfmpegTranscoder::default().with_runner(FfmpegRunner::with_binary(engine));
    let (seen, on_progress) = recorder();

    transcoder
        .transcode(&request(dir.path()), on_progress)
        .await
        .unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen, vec![0.25, 0.75, 1.0]);
}

#[tokio::test]
async fn non_zero_exit_carries_code_and_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let engine = write_engine(
        dir.path(),
        r#"echo "out_time_us=0" >&2
echo "job-input.mp4: Invalid data found when processing input" >&2
exit 1"#,
    );

    let transcoder =
        FfmpegTranscoder::default().with_runner(FfmpegRunner::with_binary(engine));
    let (_, on_progress) = recorder();

    let err = transcoder
        .transcode(&request(dir.path()), on_progress)
        .await
        .unwrap_err();

    match &err {
        MediaError::EngineFailure {
            exit_code,
            diagnostic,
        } => {
            assert_eq!(*exit_code, Some(1));
            assert!(diagnostic.contains("Invalid data found when processing input"));
            assert!(!diagnostic.contains("out_time_us"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("exited with code 1"));
}

#[tokio::test]
async fn clean_exit_without_output_is_output_missing() {
    let dir = tempfile::tempdir().unwrap();
    let engine = write_engine(dir.path(), "exit 0");

    let transcoder =
        FfmpegTranscoder::default().with_runner(FfmpegRunner::with_binary(engine));
    let (_, on_progress) = recorder();

    let err = transcoder
        .transcode(&request(dir.path()), on_progress)
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::OutputMissing(_)));
}

/// What ffprobe reports about an exported clip.
struct ClipInfo {
    width: u64,
    height: u64,
    has_audio: bool,
    duration: f64,
}

async fn make_source(path: &Path, with_audio: bool) {
    let mut cmd = tokio::process::Command::new("ffmpeg");
    cmd.args(["-y", "-v", "error", "-f", "lavfi", "-i", "testsrc=duration=10:size=1280x720:rate=25"]);
    if with_audio {
        cmd.args(["-f", "lavfi", "-i", "sine=duration=10", "-shortest"]);
    }
    let status = cmd.arg(path).status().await.unwrap();
    assert!(status.success());
}

async fn inspect(path: &Path) -> ClipInfo {
    let output = tokio::process::Command::new("ffprobe")
        .args(["-v", "error", "-show_entries", "stream=codec_type,width,height:format=duration"])
        .args(["-of", "json"])
        .arg(path)
        .output()
        .await
        .unwrap();
    assert!(output.status.success());

    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let streams = info["streams"].as_array().unwrap();
    let video = streams
        .iter()
        .find(|s| s["codec_type"] == "video")
        .unwrap();

    ClipInfo {
        width: video["width"].as_u64().unwrap(),
        height: video["height"].as_u64().unwrap(),
        has_audio: streams.iter().any(|s| s["codec_type"] == "audio"),
        duration: info["format"]["duration"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap(),
    }
}

#[tokio::test]
#[ignore = "requires ffmpeg and ffprobe in PATH"]
async fn real_ffmpeg_trims_resizes_and_drops_audio() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("job-input.mp4");
    make_source(&source, true).await;

    let (seen, on_progress) = recorder();
    let request = TranscodeRequest {
        start_time: 2.0,
        duration: 4.0,
        width: 850,
        height: 480,
        remove_audio: true,
        ..request(dir.path())
    };

    FfmpegTranscoder::default()
        .transcode(&request, on_progress)
        .await
        .unwrap();

    let clip = inspect(&request.dest_path).await;
    assert_eq!((clip.width, clip.height), (850, 480));
    assert!(!clip.has_audio);
    assert!((clip.duration - 4.0).abs() < 0.25, "duration {}", clip.duration);

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.last().copied(), Some(1.0));
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
#[ignore = "requires ffmpeg and ffprobe in PATH"]
async fn real_ffmpeg_keeps_audio_optional_for_silent_sources() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("job-input.mp4");
    make_source(&source, false).await;

    let (_, on_progress) = recorder();
    let request = TranscodeRequest {
        start_time: 0.0,
        duration: 3.0,
        remove_audio: false,
        ..request(dir.path())
    };

    FfmpegTranscoder::default()
        .transcode(&request, on_progress)
        .await
        .unwrap();

    let clip = inspect(&request.dest_path).await;
    assert_eq!((clip.width, clip.height), (630, 354));
    assert!(!clip.has_audio);
    assert!((clip.duration - 3.0).abs() < 0.25, "duration {}", clip.duration);
}
