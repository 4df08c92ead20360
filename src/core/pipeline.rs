//! Pipeline Orchestrator
//!
//! Runs the five stages strictly in sequence — script selection, narration
//! synthesis, footage acquisition, composition, publish — passing value
//! objects between them. Owns intermediate-file naming and best-effort
//! cleanup; holds no business logic of its own. Any stage error aborts the
//! run and propagates to the caller.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::compose::Compositor;
use super::config::Config;
use super::ffmpeg::{FFmpegRunner, RenderSettings};
use super::publish::{PublishRecord, Publisher, VideoMetadata};
use super::script::{self, ScriptChoice};
use super::stock::{self, PexelsClient};
use super::tts::{self, GoogleTranslateTts, SpeechBackend};
use super::PipelineResult;

/// Narration audio file name inside the work dir
const NARRATION_FILE: &str = "voice.mp3";

/// Downloaded footage file name inside the work dir
const FOOTAGE_FILE: &str = "background.mp4";

/// Final rendered output file name inside the work dir
const OUTPUT_FILE: &str = "final_video.mp4";

/// Outcome of a completed run
#[derive(Debug)]
pub enum RunOutcome {
    /// Uploaded to the platform
    Published(PublishRecord),
    /// Rendered locally; upload credentials were absent
    SavedLocally(PathBuf),
}

/// The assembled pipeline
pub struct Pipeline {
    config: Config,
    runner: FFmpegRunner,
    speech: Box<dyn SpeechBackend>,
    stock: PexelsClient,
    /// Predetermined script index; `None` selects at random
    script_index: Option<usize>,
}

impl Pipeline {
    /// Wires up all stages from the configuration.
    pub fn new(config: Config, runner: FFmpegRunner) -> PipelineResult<Self> {
        let speech = GoogleTranslateTts::new(config.request_timeout)?;
        let stock = PexelsClient::new(
            config.pexels_api_key.clone(),
            config.request_timeout,
            config.download_timeout,
        )?;

        Ok(Self {
            config,
            runner,
            speech: Box::new(speech),
            stock,
            script_index: None,
        })
    }

    /// Force a specific script from the pool (CLI `--script`)
    pub fn with_script_index(mut self, idx: usize) -> Self {
        self.script_index = Some(idx);
        self
    }

    /// Substitute the speech backend (tests)
    pub fn with_speech_backend(mut self, backend: Box<dyn SpeechBackend>) -> Self {
        self.speech = backend;
        self
    }

    /// Runs the full pipeline once.
    ///
    /// Intermediates are removed whether the stages succeed or fail, unless
    /// the configuration asks to keep them.
    pub async fn run(&self) -> PipelineResult<RunOutcome> {
        tokio::fs::create_dir_all(&self.config.work_dir).await?;

        let narration_path = self.config.work_dir.join(NARRATION_FILE);
        let footage_path = self.config.work_dir.join(FOOTAGE_FILE);
        let output_path = self.config.work_dir.join(OUTPUT_FILE);

        let result = self
            .run_stages(&narration_path, &footage_path, &output_path)
            .await;

        if !self.config.keep_intermediates {
            cleanup(&[narration_path, footage_path]).await;
        }

        result
    }

    async fn run_stages(
        &self,
        narration_path: &Path,
        footage_path: &Path,
        output_path: &Path,
    ) -> PipelineResult<RunOutcome> {
        // Stage 1: script selection
        let choice = match self.script_index {
            Some(idx) => script::nth_script(idx),
            None => script::select_script(),
        };
        info!("Script selected: \"{}\"", choice.title_hint);

        // Stage 2: narration synthesis
        let narration = tts::synthesize_narration(
            self.speech.as_ref(),
            &self.runner,
            &choice.text,
            &self.config.language,
            narration_path,
        )
        .await?;
        info!("Narration synthesized ({:.2}s)", narration.duration_sec);

        // Stage 3: footage acquisition
        let response = self
            .stock
            .search(&self.config.query, self.config.per_page)
            .await?;
        let candidate = stock::select_candidate(&response)?;
        info!(
            "Footage candidate: {}x{}, ~{:.0}s",
            candidate.width, candidate.height, candidate.duration_hint_sec
        );
        self.stock.download(&candidate, footage_path).await?;

        // Stage 4: composition
        let title = format!("{} 🌌", self.config.title_prefix);
        let compositor = Compositor::new(self.runner.clone(), RenderSettings::default());
        let composed = compositor
            .compose(footage_path, &narration, &title, output_path)
            .await?;

        // Stage 5: publish (skipped without credentials)
        match &self.config.upload {
            Some(creds) => {
                let metadata = self.build_metadata(&choice);
                let publisher = Publisher::new(creds.clone(), self.config.request_timeout)?;
                let record = publisher.publish(&composed.path, &metadata).await?;
                Ok(RunOutcome::Published(record))
            }
            None => {
                info!("No upload credentials configured; skipping publish");
                Ok(RunOutcome::SavedLocally(composed.path.clone()))
            }
        }
    }

    fn build_metadata(&self, choice: &ScriptChoice) -> VideoMetadata {
        VideoMetadata::new(
            format!("{}: {}", self.config.title_prefix, choice.title_hint),
            choice.text.clone(),
        )
        .with_tags(
            ["space", "astronomy", "shorts"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
        )
        .with_privacy(self.config.privacy)
    }
}

/// Best-effort removal of intermediate files; failures are non-fatal.
async fn cleanup(paths: &[PathBuf]) {
    for path in paths {
        if let Err(err) = tokio::fs::remove_file(path).await {
            warn!("Could not remove {}: {}", path.display(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::publish::PrivacyStatus;
    use std::time::Duration;

    fn test_config(dir: PathBuf) -> Config {
        Config {
            pexels_api_key: "test-key".to_string(),
            upload: None,
            title_prefix: "Beyond Earth".to_string(),
            work_dir: dir,
            query: "space stars galaxy".to_string(),
            language: "en".to_string(),
            per_page: 5,
            privacy: PrivacyStatus::Unlisted,
            request_timeout: Duration::from_secs(5),
            download_timeout: Duration::from_secs(5),
            keep_intermediates: false,
        }
    }

    #[test]
    fn test_metadata_built_from_script_choice() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().to_path_buf());

        let choice = crate::core::script::nth_script(0);
        // Metadata assembly is pure; exercise it without a runner.
        let metadata = VideoMetadata::new(
            format!("{}: {}", config.title_prefix, choice.title_hint),
            choice.text.clone(),
        )
        .with_privacy(config.privacy);

        assert!(metadata.title.starts_with("Beyond Earth: "));
        assert_eq!(metadata.description, choice.text);
        assert_eq!(metadata.privacy, PrivacyStatus::Unlisted);
    }

    /// Backend that writes a placeholder file so the narration stage reaches
    /// the audio probe.
    struct StubBackend;

    #[async_trait::async_trait]
    impl SpeechBackend for StubBackend {
        async fn synthesize(&self, _text: &str, _lang: &str, out_path: &Path) -> PipelineResult<()> {
            tokio::fs::write(out_path, b"not real audio").await?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_intermediates_removed_when_a_stage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().to_path_buf());

        let info = crate::core::ffmpeg::FFmpegInfo {
            ffmpeg_path: PathBuf::from("/nonexistent/ffmpeg"),
            ffprobe_path: PathBuf::from("/nonexistent/ffprobe"),
            version: "0.0-test".to_string(),
        };
        let pipeline = Pipeline::new(config, FFmpegRunner::new(info))
            .unwrap()
            .with_script_index(0)
            .with_speech_backend(Box::new(StubBackend));

        // Probing the narration fails without ffprobe, aborting the run
        // right after the backend wrote voice.mp3.
        assert!(pipeline.run().await.is_err());
        assert!(!dir.path().join("voice.mp3").exists());
    }

    #[tokio::test]
    async fn test_cleanup_ignores_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-there.mp4");
        let present = dir.path().join("there.mp3");
        tokio::fs::write(&present, b"x").await.unwrap();

        cleanup(&[missing.clone(), present.clone()]).await;
        assert!(!present.exists());
        assert!(!missing.exists());
    }

    #[test]
    fn test_no_credentials_means_no_publish() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().to_path_buf());
        assert!(!config.can_publish());
    }
}
