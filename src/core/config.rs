//! Run Configuration
//!
//! All credentials and tunables are resolved once at startup and carried in
//! a [`Config`] passed by reference into each stage. No stage reads process
//! environment directly.
//!
//! Absence of upload credentials is a valid configuration: the publish
//! stage is skipped and the run still succeeds with a local file.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use super::publish::PrivacyStatus;
use super::{PipelineError, PipelineResult};

/// Env var holding the Pexels API key (required)
pub const ENV_PEXELS_API_KEY: &str = "PEXELS_API_KEY";

/// Env vars holding the upload credentials (all three or none)
pub const ENV_YOUTUBE_CLIENT_ID: &str = "YOUTUBE_CLIENT_ID";
pub const ENV_YOUTUBE_CLIENT_SECRET: &str = "YOUTUBE_CLIENT_SECRET";
pub const ENV_YOUTUBE_REFRESH_TOKEN: &str = "YOUTUBE_REFRESH_TOKEN";

/// Env var overriding the uploaded-title prefix
pub const ENV_TITLE_PREFIX: &str = "AUTOREEL_TITLE_PREFIX";

/// Env var overriding the working directory
pub const ENV_WORK_DIR: &str = "AUTOREEL_WORK_DIR";

const DEFAULT_TITLE_PREFIX: &str = "Beyond Earth";
const DEFAULT_WORK_DIR: &str = "videos";
const DEFAULT_QUERY: &str = "space stars galaxy";
const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_PER_PAGE: u32 = 5;

/// OAuth client credentials for the upload platform
#[derive(Debug, Clone)]
pub struct UploadCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// Resolved run configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Pexels API key
    pub pexels_api_key: String,
    /// Upload credentials; `None` skips the publish stage
    pub upload: Option<UploadCredentials>,
    /// Prefix for the uploaded video title
    pub title_prefix: String,
    /// Working directory for intermediates and the final output
    pub work_dir: PathBuf,
    /// Stock-footage search query
    pub query: String,
    /// Narration language code (e.g. "en")
    pub language: String,
    /// Search result-count hint
    pub per_page: u32,
    /// Privacy level for the uploaded video
    pub privacy: PrivacyStatus,
    /// Timeout applied to search, TTS, and token requests
    pub request_timeout: Duration,
    /// Timeout applied to the footage download
    pub download_timeout: Duration,
    /// Keep intermediate files after the run
    pub keep_intermediates: bool,
}

impl Config {
    /// Builds a configuration from process environment variables.
    ///
    /// Fails with `InvalidConfig` if the footage-provider key is missing.
    /// Upload credentials are optional, but a partial set is treated as
    /// absent (publish skipped) rather than an error.
    pub fn from_env() -> PipelineResult<Self> {
        let pexels_api_key = read_env(ENV_PEXELS_API_KEY).ok_or_else(|| {
            PipelineError::InvalidConfig(format!("{} is not set", ENV_PEXELS_API_KEY))
        })?;

        let client_id = read_env(ENV_YOUTUBE_CLIENT_ID);
        let client_secret = read_env(ENV_YOUTUBE_CLIENT_SECRET);
        let refresh_token = read_env(ENV_YOUTUBE_REFRESH_TOKEN);

        let upload = match (client_id, client_secret, refresh_token) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => {
                Some(UploadCredentials {
                    client_id,
                    client_secret,
                    refresh_token,
                })
            }
            (None, None, None) => None,
            _ => {
                warn!(
                    "Partial upload credentials found; set all of {}, {}, {} to publish. \
                     The publish stage will be skipped.",
                    ENV_YOUTUBE_CLIENT_ID, ENV_YOUTUBE_CLIENT_SECRET, ENV_YOUTUBE_REFRESH_TOKEN
                );
                None
            }
        };

        Ok(Self {
            pexels_api_key,
            upload,
            title_prefix: read_env(ENV_TITLE_PREFIX)
                .unwrap_or_else(|| DEFAULT_TITLE_PREFIX.to_string()),
            work_dir: PathBuf::from(read_env(ENV_WORK_DIR).unwrap_or_else(|| {
                DEFAULT_WORK_DIR.to_string()
            })),
            query: DEFAULT_QUERY.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            per_page: DEFAULT_PER_PAGE,
            privacy: PrivacyStatus::default(),
            request_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(60),
            keep_intermediates: false,
        })
    }

    /// Returns true when the publish stage should run
    pub fn can_publish(&self) -> bool {
        self.upload.is_some()
    }
}

fn read_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
