//! Autoreel Error Definitions
//!
//! Defines the pipeline-wide error taxonomy. Stage errors are never
//! recovered locally; they propagate to `main` and terminate the run.

use thiserror::Error;

use super::ffmpeg::FFmpegError;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("No usable search results: {0}")]
    EmptyResult(String),

    #[error("Footage download failed: {0}")]
    Download(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Pipeline result type
pub type PipelineResult<T> = Result<T, PipelineError>;

impl From<FFmpegError> for PipelineError {
    fn from(err: FFmpegError) -> Self {
        PipelineError::Render(err.to_string())
    }
}
