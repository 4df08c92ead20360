//! Stock Footage Provider
//!
//! Pexels video search client: issues an authorized search, picks the
//! first usable file variant in API order, and streams it to disk.
//!
//! Selection policy is first-match only — no resolution or quality
//! ranking. A variant is usable when it has a non-zero width, a present
//! link, and the target container format.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{PipelineError, PipelineResult, TimeSec};

/// Default base URL for the Pexels API
const DEFAULT_BASE_URL: &str = "https://api.pexels.com";

/// The only container format the compositor accepts
const TARGET_CONTAINER: &str = "video/mp4";

/// Pexels caps per_page at 80
const MAX_PER_PAGE: u32 = 80;

/// Pexels API response structures
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub videos: Vec<Video>,
    #[serde(default)]
    pub total_results: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    pub id: u64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub video_files: Vec<VideoFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoFile {
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub link: String,
}

/// The footage variant chosen for download
#[derive(Debug, Clone, PartialEq)]
pub struct FootageCandidate {
    /// Direct download URL
    pub source_url: String,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Duration hint from the search result (whole seconds)
    pub duration_hint_sec: TimeSec,
    /// Container format (MIME), always the target format
    pub container_format: String,
}

/// Pexels video search client
pub struct PexelsClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    download_timeout: Duration,
}

impl std::fmt::Debug for PexelsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PexelsClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl PexelsClient {
    /// Create a new client. `request_timeout` bounds the search request;
    /// `download_timeout` bounds the footage transfer.
    pub fn new(
        api_key: impl Into<String>,
        request_timeout: Duration,
        download_timeout: Duration,
    ) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PipelineError::Download(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            download_timeout,
        })
    }

    /// Set custom base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn search_url(&self) -> String {
        format!("{}/videos/search", self.base_url)
    }

    /// Searches for stock videos matching `query`.
    pub async fn search(&self, query: &str, per_page: u32) -> PipelineResult<SearchResponse> {
        if self.api_key.is_empty() {
            return Err(PipelineError::Auth(
                "Pexels API key is missing".to_string(),
            ));
        }

        let per_page = per_page.clamp(1, MAX_PER_PAGE);
        let resp = self
            .client
            .get(self.search_url())
            .header("Authorization", &self.api_key)
            .query(&[("query", query), ("per_page", &per_page.to_string())])
            .send()
            .await
            .map_err(|e| PipelineError::Download(format!("Search request failed: {}", e)))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(PipelineError::Auth(format!(
                "Pexels rejected the API key (status {})",
                status
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let truncated: String = body.chars().take(200).collect();
            return Err(PipelineError::Download(format!(
                "Search failed with status {}: {}",
                status, truncated
            )));
        }

        let parsed: SearchResponse = resp
            .json()
            .await
            .map_err(|e| PipelineError::Download(format!("Failed to parse search response: {}", e)))?;

        debug!(
            "Search for '{}' returned {} video(s) ({} total)",
            query,
            parsed.videos.len(),
            parsed.total_results
        );
        Ok(parsed)
    }

    /// Streams the chosen candidate to `dest`.
    pub async fn download(&self, candidate: &FootageCandidate, dest: &Path) -> PipelineResult<()> {
        let mut resp = self
            .client
            .get(&candidate.source_url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|e| PipelineError::Download(format!("Footage request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(PipelineError::Download(format!(
                "Footage download failed with status {}",
                resp.status()
            )));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| PipelineError::Download(format!("Failed to create footage file: {}", e)))?;

        let mut total_bytes: u64 = 0;
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| PipelineError::Download(format!("Failed to read chunk: {}", e)))?
        {
            total_bytes = total_bytes.saturating_add(chunk.len() as u64);
            file.write_all(&chunk)
                .await
                .map_err(|e| PipelineError::Download(format!("Failed to write footage: {}", e)))?;
        }

        file.flush()
            .await
            .map_err(|e| PipelineError::Download(format!("Failed to flush footage file: {}", e)))?;

        info!(
            "Footage downloaded to {} ({} bytes)",
            dest.display(),
            total_bytes
        );
        Ok(())
    }
}

/// Picks the first usable variant in API response order.
///
/// Iterates videos as returned, then each video's file variants in order,
/// and returns the first with a non-zero width, a present link, and the
/// target container format. Deterministic for a fixed response.
pub fn select_candidate(response: &SearchResponse) -> PipelineResult<FootageCandidate> {
    if response.videos.is_empty() {
        return Err(PipelineError::EmptyResult(
            "Search returned no videos".to_string(),
        ));
    }

    for video in &response.videos {
        for file in &video.video_files {
            if file.width > 0 && !file.link.is_empty() && file.file_type == TARGET_CONTAINER {
                return Ok(FootageCandidate {
                    source_url: file.link.clone(),
                    width: file.width,
                    height: file.height,
                    duration_hint_sec: video.duration as TimeSec,
                    container_format: file.file_type.clone(),
                });
            }
        }
    }

    Err(PipelineError::EmptyResult(
        "No video file variant in a supported container".to_string(),
    ))
}
