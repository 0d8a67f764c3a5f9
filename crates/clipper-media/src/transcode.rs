//! Trim-and-resize transcoding.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use clipper_models::EncodingConfig;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::scale_pad_filter;

/// Progress callback receiving the encoded fraction in `[0, 1]`.
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync + 'static>;

/// One trim-and-resize operation.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeRequest {
    pub source_path: PathBuf,
    pub dest_path: PathBuf,
    /// Trim start in seconds
    pub start_time: f64,
    /// Trim length in seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub remove_audio: bool,
}

/// Video transcoding engine.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Produce `dest_path` from the trim window of `source_path`.
    ///
    /// Succeeds only when the engine exits cleanly and the destination
    /// exists. Progress fractions are reported in non-decreasing order.
    async fn transcode(&self, request: &TranscodeRequest, on_progress: ProgressFn)
        -> MediaResult<()>;
}

/// [`Transcoder`] backed by the FFmpeg CLI.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
}

impl FfmpegTranscoder {
    pub fn new(encoding: EncodingConfig) -> Self {
        Self {
            runner: FfmpegRunner::new(),
            encoding,
        }
    }

    /// Use a specific FFmpeg executable instead of the one on `PATH`.
    pub fn with_runner(mut self, runner: FfmpegRunner) -> Self {
        self.runner = runner;
        self
    }

    /// FFmpeg invocation for `request`.
    pub fn build_command(&self, request: &TranscodeRequest) -> FfmpegCommand {
        let enc = &self.encoding;

        let cmd = FfmpegCommand::new(&request.source_path, &request.dest_path)
            .seek(request.start_time)
            .duration(request.duration)
            .video_filter(scale_pad_filter(request.width, request.height))
            .map("0:v:0");

        let cmd = if request.remove_audio {
            cmd.no_audio()
        } else {
            // Trailing '?' keeps sources without an audio stream working
            cmd.map("0:a:0?")
                .audio_codec(enc.audio_codec.as_str())
                .audio_bitrate(enc.audio_bitrate.as_str())
        };

        let cmd = cmd
            .video_codec(enc.codec.as_str())
            .preset(enc.preset.as_str())
            .crf(enc.crf)
            .pixel_format(enc.pixel_format.as_str());

        if enc.faststart {
            cmd.faststart()
        } else {
            cmd
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        request: &TranscodeRequest,
        on_progress: ProgressFn,
    ) -> MediaResult<()> {
        let cmd = self.build_command(request);
        let total = request.duration;

        info!(
            source = %request.source_path.display(),
            start = request.start_time,
            duration = request.duration,
            size = format!("{}x{}", request.width, request.height),
            remove_audio = request.remove_audio,
            "Transcoding clip"
        );

        // f64 bits of the highest fraction reported so far
        let reported = Arc::new(AtomicU64::new(0f64.to_bits()));
        let callback = Arc::clone(&on_progress);
        let high_water = Arc::clone(&reported);

        self.runner
            .run_with_progress(&cmd, move |progress| {
                let fraction = progress.fraction(total);
                let previous = f64::from_bits(high_water.load(Ordering::Relaxed));
                if fraction > previous {
                    high_water.store(fraction.to_bits(), Ordering::Relaxed);
                    callback(fraction);
                }
            })
            .await?;

        if !tokio::fs::try_exists(&request.dest_path).await? {
            return Err(MediaError::OutputMissing(request.dest_path.clone()));
        }

        if f64::from_bits(reported.load(Ordering::Relaxed)) < 1.0 {
            on_progress(1.0);
        }

        debug!(dest = %request.dest_path.display(), "Transcode finished");
        Ok(())
    }
}
