//! Narration Synthesis
//!
//! Converts narration text into a local MP3 via the Google Translate TTS
//! endpoint (the same backend gTTS wraps). The endpoint caps requests at
//! 200 characters, so text is chunked on whitespace and the returned MP3
//! segments are concatenated; MP3 frames concatenate cleanly.
//!
//! The backend sits behind [`SpeechBackend`] so tests can substitute a
//! fake without network access.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::ffmpeg::FFmpegRunner;
use super::{PipelineError, PipelineResult, TimeSec};

/// Default base URL for the Google Translate TTS endpoint
const DEFAULT_BASE_URL: &str = "https://translate.google.com/translate_tts";

/// Maximum characters the endpoint accepts per request
const MAX_CHUNK_CHARS: usize = 200;

/// A synthesized narration: source text plus its audio asset
#[derive(Debug, Clone)]
pub struct Narration {
    /// Source text
    pub text: String,
    /// Path to the synthesized audio file
    pub audio_path: PathBuf,
    /// Audio duration in seconds, probed after synthesis
    pub duration_sec: TimeSec,
}

/// Text-to-speech backend seam
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Synthesizes `text` in language `lang` into an audio file at `out_path`.
    async fn synthesize(&self, text: &str, lang: &str, out_path: &Path) -> PipelineResult<()>;
}

/// Google Translate TTS backend
pub struct GoogleTranslateTts {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleTranslateTts {
    /// Create a new backend with the given request timeout
    pub fn new(timeout: Duration) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Synthesis(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Set custom base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn fetch_chunk(
        &self,
        chunk: &str,
        lang: &str,
        idx: usize,
        total: usize,
    ) -> PipelineResult<Vec<u8>> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", lang),
                ("q", chunk),
                ("total", &total.to_string()),
                ("idx", &idx.to_string()),
                ("textlen", &chunk.chars().count().to_string()),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::Synthesis(format!("TTS request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::Synthesis(format!(
                "TTS backend rejected chunk {}/{} with status {}",
                idx + 1,
                total,
                status
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| PipelineError::Synthesis(format!("Failed to read TTS response: {}", e)))?;

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechBackend for GoogleTranslateTts {
    async fn synthesize(&self, text: &str, lang: &str, out_path: &Path) -> PipelineResult<()> {
        validate_input(text, lang)?;

        let chunks = chunk_text(text);
        let total = chunks.len();
        debug!("Synthesizing {} chunk(s) for {} chars", total, text.len());

        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let segment = self.fetch_chunk(chunk, lang, idx, total).await?;
            audio.extend_from_slice(&segment);
        }

        // One write at the end: a failed run leaves no half-written asset.
        tokio::fs::write(out_path, &audio).await?;

        info!(
            "Narration audio written to {} ({} bytes)",
            out_path.display(),
            audio.len()
        );
        Ok(())
    }
}

/// Synthesizes narration and probes its duration.
pub async fn synthesize_narration(
    backend: &dyn SpeechBackend,
    runner: &FFmpegRunner,
    text: &str,
    lang: &str,
    out_path: &Path,
) -> PipelineResult<Narration> {
    backend.synthesize(text, lang, out_path).await?;

    let media = runner.probe(out_path).await.map_err(|e| {
        PipelineError::Synthesis(format!("Could not read narration duration: {}", e))
    })?;

    if media.duration_sec <= 0.0 {
        return Err(PipelineError::Synthesis(
            "Synthesized narration has zero duration".to_string(),
        ));
    }

    Ok(Narration {
        text: text.to_string(),
        audio_path: out_path.to_path_buf(),
        duration_sec: media.duration_sec,
    })
}

/// Rejects empty text and malformed language codes before any request.
fn validate_input(text: &str, lang: &str) -> PipelineResult<()> {
    if text.trim().is_empty() {
        return Err(PipelineError::Synthesis(
            "Narration text cannot be empty".to_string(),
        ));
    }

    let lang_ok = !lang.is_empty()
        && lang.len() <= 10
        && lang.chars().all(|c| c.is_ascii_alphabetic() || c == '-');
    if !lang_ok {
        return Err(PipelineError::Synthesis(format!(
            "Unsupported language code: '{}'",
            lang
        )));
    }

    Ok(())
}

/// Splits text into ≤200-char chunks on whitespace boundaries.
///
/// A single word longer than the limit is split hard rather than rejected.
fn chunk_text(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        // Hard-split oversized words
        while word.chars().count() > MAX_CHUNK_CHARS {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let split_at = word
                .char_indices()
                .nth(MAX_CHUNK_CHARS)
                .map(|(i, _)| i)
                .unwrap_or(word.len());
            let (head, tail) = word.split_at(split_at);
            chunks.push(head.to_string());
            word = tail;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };

        if needed > MAX_CHUNK_CHARS {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_text() {
        assert!(validate_input("  ", "en").is_err());
        assert!(validate_input("", "en").is_err());
        assert!(validate_input("hello", "en").is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_language() {
        assert!(validate_input("hello", "").is_err());
        assert!(validate_input("hello", "en_US!").is_err());
        assert!(validate_input("hello", "toolonglangcode").is_err());
        assert!(validate_input("hello", "en-GB").is_ok());
    }

    #[test]
    fn test_chunk_short_text_is_single_chunk() {
        let chunks = chunk_text("The universe is vast.");
        assert_eq!(chunks, vec!["The universe is vast.".to_string()]);
    }

    #[test]
    fn test_chunks_respect_limit_and_reassemble() {
        let word = "star";
        let text = std::iter::repeat(word)
            .take(120)
            .collect::<Vec<_>>()
            .join(" ");

        let chunks = chunk_text(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= MAX_CHUNK_CHARS);
        }
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn test_chunking_splits_on_whitespace() {
        let text = format!("{} {}", "a".repeat(150), "b".repeat(100));
        let chunks = chunk_text(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(150));
        assert_eq!(chunks[1], "b".repeat(100));
    }

    #[test]
    fn test_oversized_word_is_hard_split() {
        let text = "x".repeat(450);
        let chunks = chunk_text(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 200);
        assert_eq!(chunks[1].len(), 200);
        assert_eq!(chunks[2].len(), 50);
    }

    #[tokio::test]
    async fn test_fake_backend_via_trait_object() {
        struct FakeBackend;

        #[async_trait]
        impl SpeechBackend for FakeBackend {
            async fn synthesize(
                &self,
                text: &str,
                lang: &str,
                out_path: &Path,
            ) -> PipelineResult<()> {
                validate_input(text, lang)?;
                tokio::fs::write(out_path, b"fake mp3 bytes").await?;
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("voice.mp3");
        let backend: Box<dyn SpeechBackend> = Box::new(FakeBackend);

        backend.synthesize("hello", "en", &out).await.unwrap();
        assert!(out.exists());

        let err = backend.synthesize("", "en", &out).await.unwrap_err();
        assert!(matches!(err, PipelineError::Synthesis(_)));
    }
}
