//! FFmpeg CLI wrapper for trimming and resizing clips.
//!
//! This crate provides:
//! - A builder for FFmpeg command lines and an async runner
//! - Parsing of FFmpeg's `-progress` key/value stream
//! - The [`Transcoder`] trait and its FFmpeg implementation

pub mod command;
pub mod error;
pub mod filters;
pub mod progress;
pub mod transcode;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use progress::FfmpegProgress;
pub use transcode::{FfmpegTranscoder, ProgressFn, TranscodeRequest, Transcoder};
