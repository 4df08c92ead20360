//! FFmpeg Integration Module
//!
//! Thin plumbing over a system-installed FFmpeg/FFprobe pair:
//! - binary detection on PATH
//! - media probing (duration, stream info)
//! - one-shot encode invocations for the compositor
//!
//! Detection happens once at startup; a missing installation is a startup
//! error, not a render error.

mod detection;
mod runner;

pub use detection::{detect_system_ffmpeg, FFmpegInfo};
pub use runner::{AudioStreamInfo, FFmpegRunner, MediaInfo, RenderSettings, VideoStreamInfo};

/// FFmpeg-related error types
#[derive(Debug, thiserror::Error)]
pub enum FFmpegError {
    #[error("FFmpeg not found. Install FFmpeg and ensure ffmpeg/ffprobe are on PATH.")]
    NotFound,

    #[error("FFmpeg execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid input file: {0}")]
    InvalidInput(String),

    #[error("Output path error: {0}")]
    OutputError(String),

    #[error("FFprobe error: {0}")]
    ProbeError(String),

    #[error("Process error: {0}")]
    ProcessError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type FFmpegResult<T> = Result<T, FFmpegError>;
