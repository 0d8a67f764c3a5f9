//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while running the transcoding engine.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    EngineNotFound,

    #[error("FFmpeg {}: {diagnostic}", describe_exit(.exit_code))]
    EngineFailure {
        exit_code: Option<i32>,
        /// Tail of FFmpeg's diagnostic output
        diagnostic: String,
    },

    #[error("FFmpeg reported success but produced no output at {0}")]
    OutputMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

impl MediaError {
    /// Create an engine failure error.
    pub fn engine_failure(exit_code: Option<i32>, diagnostic: impl Into<String>) -> Self {
        let diagnostic = diagnostic.into();
        let diagnostic = if diagnostic.trim().is_empty() {
            "no diagnostic output".to_string()
        } else {
            diagnostic
        };
        Self::EngineFailure {
            exit_code,
            diagnostic,
        }
    }
}
