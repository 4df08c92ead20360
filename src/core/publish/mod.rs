//! Publisher
//!
//! Uploads the finished asset to YouTube: OAuth2 refresh-token exchange,
//! then a resumable upload session driven by an explicit state machine
//! {SessionInitiated, ChunkInFlight, Complete, Failed}. Chunk failures are
//! not retried; an orphaned partial session on the platform side is out of
//! this design's control.
//!
//! The state transitions are pure functions over HTTP outcomes so tests
//! cover the protocol without a network; the wall clock is injected via
//! [`Clock`] so a deadline can be exercised with a manual test clock.

use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

use super::config::UploadCredentials;
use super::{PipelineError, PipelineResult};

/// Default OAuth2 token endpoint
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Default resumable-upload initiation endpoint
const DEFAULT_UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos";

/// Upload chunk size: 8 MiB, a multiple of the protocol's 256 KiB granularity
const CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// YouTube category "Science & Technology"
const DEFAULT_CATEGORY_ID: &str = "28";

// =============================================================================
// Metadata
// =============================================================================

/// Privacy level of the uploaded video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    Public,
    #[default]
    Unlisted,
    Private,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::Public => "public",
            PrivacyStatus::Unlisted => "unlisted",
            PrivacyStatus::Private => "private",
        }
    }
}

/// Metadata sent when the upload session is initiated
#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: PrivacyStatus,
}

impl VideoMetadata {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            tags: Vec::new(),
            category_id: DEFAULT_CATEGORY_ID.to_string(),
            privacy: PrivacyStatus::default(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_privacy(mut self, privacy: PrivacyStatus) -> Self {
        self.privacy = privacy;
        self
    }

    fn to_request_body(&self) -> serde_json::Value {
        serde_json::json!({
            "snippet": {
                "title": self.title,
                "description": self.description,
                "tags": self.tags,
                "categoryId": self.category_id,
            },
            "status": {
                "privacyStatus": self.privacy.as_str(),
            }
        })
    }
}

/// Record of a completed publish
#[derive(Debug, Clone)]
pub struct PublishRecord {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub privacy: PrivacyStatus,
    /// Platform-assigned identifier for the uploaded asset
    pub remote_id: String,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

// =============================================================================
// Clock seam
// =============================================================================

/// Monotonic clock seam for deadline checks
pub trait Clock: Send + Sync {
    /// Monotonic reading since some fixed origin
    fn now(&self) -> Duration;
}

/// Production clock backed by `Instant`
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

// =============================================================================
// OAuth
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchanges the refresh token for a short-lived access token.
async fn refresh_access_token(
    client: &reqwest::Client,
    token_url: &str,
    creds: &UploadCredentials,
) -> PipelineResult<String> {
    let resp = client
        .post(token_url)
        .form(&[
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("refresh_token", creds.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ])
        .send()
        .await
        .map_err(|e| PipelineError::Auth(format!("Token refresh request failed: {}", e)))?;

    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| PipelineError::Auth(format!("Failed to read token response: {}", e)))?;

    if !status.is_success() {
        let truncated: String = body.chars().take(300).collect();
        return Err(PipelineError::Auth(format!(
            "Token refresh failed with status {}: {}",
            status, truncated
        )));
    }

    let parsed: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| PipelineError::Auth(format!("Failed to parse token response: {}", e)))?;

    Ok(parsed.access_token)
}

// =============================================================================
// Upload state machine
// =============================================================================

/// State of the resumable upload session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    /// Session URI obtained, nothing sent yet
    SessionInitiated,
    /// Bytes up to `offset` acknowledged; next chunk starts there
    ChunkInFlight { offset: u64 },
    /// Platform returned the final response object
    Complete { remote_id: String },
    /// Terminal failure (deadline or rejected chunk)
    Failed { reason: String },
}

/// Pure transition over one chunk's HTTP outcome.
///
/// 308 acknowledges the chunk and asks for more; any 2xx carries the final
/// response object whose `id` is the remote identifier; everything else is
/// a terminal failure (no chunk-level retry).
fn advance(
    offset: u64,
    sent_len: u64,
    total_bytes: u64,
    status: u16,
    body: &str,
) -> UploadState {
    match status {
        308 => {
            let next = offset + sent_len;
            if next >= total_bytes {
                UploadState::Failed {
                    reason: format!(
                        "Platform requested more data after the final chunk ({}/{} bytes sent)",
                        next, total_bytes
                    ),
                }
            } else {
                UploadState::ChunkInFlight { offset: next }
            }
        }
        200..=299 => match serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(String::from))
        {
            Some(remote_id) => UploadState::Complete { remote_id },
            None => UploadState::Failed {
                reason: "Final upload response did not contain an id".to_string(),
            },
        },
        other => UploadState::Failed {
            reason: format!("Chunk upload failed with status {}", other),
        },
    }
}

/// True when the injected deadline has elapsed since the session started
fn deadline_exceeded(now: Duration, started: Duration, deadline: Option<Duration>) -> bool {
    match deadline {
        Some(deadline) => now.saturating_sub(started) > deadline,
        None => false,
    }
}

/// Formats the Content-Range header for a chunk
fn content_range(offset: u64, chunk_len: u64, total_bytes: u64) -> String {
    format!(
        "bytes {}-{}/{}",
        offset,
        offset + chunk_len - 1,
        total_bytes
    )
}

/// HTTP client for chunk transfers. An 8 MiB chunk can legitimately take
/// minutes on a slow link, so only the connect phase is bounded; the loop's
/// injected deadline is the sole cap on total transfer time.
fn transfer_client(connect_timeout: Duration) -> PipelineResult<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| PipelineError::Upload(format!("Failed to create transfer client: {}", e)))
}

/// A live resumable upload session
struct UploadSession {
    /// Transfer client; carries no total-request timeout
    client: reqwest::Client,
    session_uri: String,
    total_bytes: u64,
    chunk_size: u64,
    state: UploadState,
}

impl UploadSession {
    /// Initiates a session and returns it in `SessionInitiated` state.
    ///
    /// The initiation POST goes through `control` (short, timeout-bounded);
    /// `transfer` is kept for the chunk PUTs.
    async fn initiate(
        control: &reqwest::Client,
        transfer: reqwest::Client,
        upload_url: &str,
        access_token: &str,
        metadata: &VideoMetadata,
        total_bytes: u64,
    ) -> PipelineResult<Self> {
        let resp = control
            .post(upload_url)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(access_token)
            .header("X-Upload-Content-Length", total_bytes.to_string())
            .header("X-Upload-Content-Type", "video/mp4")
            .json(&metadata.to_request_body())
            .send()
            .await
            .map_err(|e| PipelineError::Upload(format!("Session initiation failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let truncated: String = body.chars().take(300).collect();
            return Err(PipelineError::Upload(format!(
                "Session initiation failed with status {}: {}",
                status, truncated
            )));
        }

        let session_uri = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .ok_or_else(|| {
                PipelineError::Upload("Session initiation response missing Location".to_string())
            })?;

        debug!("Resumable upload session initiated");
        Ok(Self {
            client: transfer,
            session_uri,
            total_bytes,
            chunk_size: CHUNK_SIZE,
            state: UploadState::SessionInitiated,
        })
    }

    /// Sends one chunk and advances the state machine.
    async fn step(&mut self, file: &mut tokio::fs::File) -> PipelineResult<&UploadState> {
        let offset = match &self.state {
            UploadState::SessionInitiated => 0,
            UploadState::ChunkInFlight { offset } => *offset,
            UploadState::Complete { .. } | UploadState::Failed { .. } => return Ok(&self.state),
        };

        let chunk_len = self.chunk_size.min(self.total_bytes - offset);
        let mut buf = vec![0u8; chunk_len as usize];
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        file.read_exact(&mut buf).await?;

        let resp = self
            .client
            .put(&self.session_uri)
            .header(
                reqwest::header::CONTENT_RANGE,
                content_range(offset, chunk_len, self.total_bytes),
            )
            .body(buf)
            .send()
            .await
            .map_err(|e| PipelineError::Upload(format!("Chunk transfer failed: {}", e)))?;

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();

        self.state = advance(offset, chunk_len, self.total_bytes, status, &body);
        debug!(
            "Upload chunk at offset {} ({} bytes) -> {:?}",
            offset, chunk_len, self.state
        );
        Ok(&self.state)
    }
}

// =============================================================================
// Publisher
// =============================================================================

/// Publisher stage: token refresh + resumable chunked upload
pub struct Publisher {
    /// Control-plane client (token refresh, session initiation)
    client: reqwest::Client,
    /// Chunk-transfer client without a total-request timeout
    transfer: reqwest::Client,
    creds: UploadCredentials,
    token_url: String,
    upload_url: String,
    clock: Box<dyn Clock>,
    /// Optional cap on total upload time; `None` matches the protocol's
    /// unbounded loop and is the production default
    deadline: Option<Duration>,
}

impl Publisher {
    pub fn new(creds: UploadCredentials, request_timeout: Duration) -> PipelineResult<Self> {
        // The per-request timeout bounds only the control-plane calls; chunk
        // PUTs go through the transfer client so a slow link cannot abort a
        // healthy upload mid-chunk.
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PipelineError::Upload(format!("Failed to create HTTP client: {}", e)))?;
        let transfer = transfer_client(request_timeout)?;

        Ok(Self {
            client,
            transfer,
            creds,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            clock: Box::new(SystemClock::new()),
            deadline: None,
        })
    }

    /// Set custom endpoints (tests)
    pub fn with_endpoints(mut self, token_url: impl Into<String>, upload_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self.upload_url = upload_url.into();
        self
    }

    /// Inject a clock and a total-upload deadline
    pub fn with_deadline(mut self, clock: Box<dyn Clock>, deadline: Duration) -> Self {
        self.clock = clock;
        self.deadline = Some(deadline);
        self
    }

    /// Uploads `video_path` and returns the publish record on completion.
    pub async fn publish(
        &self,
        video_path: &Path,
        metadata: &VideoMetadata,
    ) -> PipelineResult<PublishRecord> {
        let access_token =
            refresh_access_token(&self.client, &self.token_url, &self.creds).await?;
        info!("Access token refreshed");

        let total_bytes = tokio::fs::metadata(video_path).await?.len();
        if total_bytes == 0 {
            return Err(PipelineError::Upload(
                "Refusing to upload an empty video file".to_string(),
            ));
        }

        let mut session = UploadSession::initiate(
            &self.client,
            self.transfer.clone(),
            &self.upload_url,
            &access_token,
            metadata,
            total_bytes,
        )
        .await?;

        let mut file = tokio::fs::File::open(video_path).await?;
        let started = self.clock.now();

        loop {
            if deadline_exceeded(self.clock.now(), started, self.deadline) {
                return Err(PipelineError::Upload(format!(
                    "Upload deadline of {:?} exceeded",
                    self.deadline.unwrap_or_default()
                )));
            }

            match session.step(&mut file).await? {
                UploadState::Complete { remote_id } => {
                    let remote_id = remote_id.clone();
                    info!("Upload complete, remote id {}", remote_id);
                    return Ok(PublishRecord {
                        title: metadata.title.clone(),
                        description: metadata.description.clone(),
                        tags: metadata.tags.clone(),
                        privacy: metadata.privacy,
                        remote_id,
                        published_at: chrono::Utc::now(),
                    });
                }
                UploadState::Failed { reason } => {
                    return Err(PipelineError::Upload(reason.clone()));
                }
                UploadState::SessionInitiated | UploadState::ChunkInFlight { .. } => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Manually-advanced clock for deadline tests
    struct TestClock {
        now: Mutex<Duration>,
    }

    impl TestClock {
        fn new() -> Self {
            Self {
                now: Mutex::new(Duration::ZERO),
            }
        }

        fn advance(&self, by: Duration) {
            *self.now.lock().unwrap() += by;
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Duration {
            *self.now.lock().unwrap()
        }
    }

    // ========================================================================
    // State transitions
    // ========================================================================

    #[test]
    fn test_308_advances_to_next_chunk() {
        let state = advance(0, 8, 100, 308, "");
        assert_eq!(state, UploadState::ChunkInFlight { offset: 8 });

        let state = advance(8, 8, 100, 308, "");
        assert_eq!(state, UploadState::ChunkInFlight { offset: 16 });
    }

    #[test]
    fn test_2xx_with_id_completes() {
        let state = advance(96, 4, 100, 200, r#"{"id": "abc123", "kind": "youtube#video"}"#);
        assert_eq!(
            state,
            UploadState::Complete {
                remote_id: "abc123".to_string()
            }
        );
    }

    #[test]
    fn test_2xx_without_id_fails() {
        let state = advance(96, 4, 100, 201, r#"{"kind": "youtube#video"}"#);
        assert!(matches!(state, UploadState::Failed { .. }));
    }

    #[test]
    fn test_error_status_fails_without_retry() {
        let state = advance(0, 8, 100, 500, "Internal Server Error");
        match state {
            UploadState::Failed { reason } => assert!(reason.contains("500")),
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_308_after_final_chunk_fails() {
        let state = advance(96, 4, 100, 308, "");
        assert!(matches!(state, UploadState::Failed { .. }));
    }

    #[test]
    fn test_content_range_formatting() {
        assert_eq!(content_range(0, 8, 100), "bytes 0-7/100");
        assert_eq!(content_range(96, 4, 100), "bytes 96-99/100");
    }

    /// A chunk PUT must not be bounded by the control-plane request timeout:
    /// the server here responds only after a delay well past it.
    #[tokio::test]
    async fn test_chunk_transfer_outlives_control_plane_timeout() {
        use tokio::io::AsyncWriteExt;

        let control_timeout = Duration::from_millis(100);
        let response_delay = Duration::from_millis(400);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = stream.read(&mut buf).await;
            tokio::time::sleep(response_delay).await;
            let body = r#"{"id":"vid123"}"#;
            let resp = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(resp.as_bytes()).await;
        });

        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        tokio::fs::write(&video, b"0123456789").await.unwrap();

        let mut session = UploadSession {
            client: transfer_client(control_timeout).unwrap(),
            session_uri: format!("http://{}/upload", addr),
            total_bytes: 10,
            chunk_size: CHUNK_SIZE,
            state: UploadState::SessionInitiated,
        };
        let mut file = tokio::fs::File::open(&video).await.unwrap();

        let state = session.step(&mut file).await.unwrap();
        assert_eq!(
            *state,
            UploadState::Complete {
                remote_id: "vid123".to_string()
            }
        );
    }

    // ========================================================================
    // Clock / deadline
    // ========================================================================

    #[test]
    fn test_test_clock_advances() {
        let clock = TestClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.now(), Duration::from_secs(90));
    }

    #[test]
    fn test_deadline_exceeded_with_test_clock() {
        let clock = TestClock::new();
        let started = clock.now();
        let deadline = Some(Duration::from_secs(60));

        assert!(!deadline_exceeded(clock.now(), started, deadline));

        clock.advance(Duration::from_secs(59));
        assert!(!deadline_exceeded(clock.now(), started, deadline));

        clock.advance(Duration::from_secs(2));
        assert!(deadline_exceeded(clock.now(), started, deadline));
    }

    #[test]
    fn test_no_deadline_never_expires() {
        let clock = TestClock::new();
        clock.advance(Duration::from_secs(60 * 60 * 24));
        assert!(!deadline_exceeded(clock.now(), Duration::ZERO, None));
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    #[test]
    fn test_metadata_request_body() {
        let meta = VideoMetadata::new("Beyond Earth 🌌", "Auto-generated short")
            .with_tags(vec!["space".to_string(), "stars".to_string()])
            .with_privacy(PrivacyStatus::Public);

        let body = meta.to_request_body();
        assert_eq!(body["snippet"]["title"], "Beyond Earth 🌌");
        assert_eq!(body["snippet"]["categoryId"], DEFAULT_CATEGORY_ID);
        assert_eq!(body["snippet"]["tags"][0], "space");
        assert_eq!(body["status"]["privacyStatus"], "public");
    }

    #[test]
    fn test_privacy_default_and_serialization() {
        assert_eq!(PrivacyStatus::default(), PrivacyStatus::Unlisted);
        assert_eq!(
            serde_json::to_string(&PrivacyStatus::Private).unwrap(),
            "\"private\""
        );
        assert_eq!(PrivacyStatus::Public.as_str(), "public");
    }

    #[test]
    fn test_chunk_size_granularity() {
        // Resumable uploads require chunks in 256 KiB multiples.
        assert_eq!(CHUNK_SIZE % (256 * 1024), 0);
    }
}
