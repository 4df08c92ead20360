//! Compositor
//!
//! Aligns footage to the narration duration (trim or loop), prepends a
//! fixed-length intro title card, overlays a lower-third caption, attaches
//! the narration audio, and encodes to H.264/AAC in a single ffmpeg
//! filter-graph invocation.
//!
//! Audio policy: narration is delayed by the intro duration, so the title
//! card plays silent and speech starts exactly when the footage begins.
//!
//! Output is written to a `.part.mp4` sibling and renamed on success, so a
//! failed render never leaves a file the pipeline would treat as valid.

use std::path::{Path, PathBuf};

use tracing::info;

use super::ffmpeg::{FFmpegRunner, RenderSettings};
use super::tts::Narration;
use super::{PipelineError, PipelineResult, TimeSec};

/// Fixed intro title-card duration, independent of narration length
pub const INTRO_DURATION_SEC: TimeSec = 3.0;

/// Title font size on the intro card
const TITLE_FONT_SIZE: u32 = 60;

/// Caption font size
const CAPTION_FONT_SIZE: u32 = 36;

/// Approximate glyph advance as a fraction of font size, used for wrapping
const GLYPH_WIDTH_RATIO: f64 = 0.55;

/// Caption is wrapped to this fraction of the frame width
const CAPTION_WIDTH_RATIO: f64 = 0.9;

/// The finished, encoded video asset
#[derive(Debug, Clone)]
pub struct ComposedVideo {
    /// Path to the rendered file
    pub path: PathBuf,
    /// Total duration: intro + narration
    pub duration_sec: TimeSec,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

/// Compositing stage over an FFmpeg runner
pub struct Compositor {
    runner: FFmpegRunner,
    settings: RenderSettings,
}

impl Compositor {
    pub fn new(runner: FFmpegRunner, settings: RenderSettings) -> Self {
        Self { runner, settings }
    }

    /// Composites footage + narration + overlay text into `output`.
    ///
    /// The visual track (excluding the intro card) lasts exactly the
    /// narration duration: footage is trimmed when longer, looped then
    /// trimmed when shorter.
    pub async fn compose(
        &self,
        footage_path: &Path,
        narration: &Narration,
        title: &str,
        output: &Path,
    ) -> PipelineResult<ComposedVideo> {
        let media = self.runner.probe(footage_path).await?;
        let video = media.video.as_ref().ok_or_else(|| {
            PipelineError::Render("Downloaded footage has no video stream".to_string())
        })?;
        if video.width == 0 || video.height == 0 {
            return Err(PipelineError::Render(
                "Downloaded footage has no usable frame dimensions".to_string(),
            ));
        }

        let loops = loop_count(narration.duration_sec, media.duration_sec)?;
        info!(
            "Compositing: narration {:.2}s, footage {:.2}s, {} loop(s)",
            narration.duration_sec, media.duration_sec, loops
        );

        // Partial outputs are never valid: render to a sibling, rename last.
        let part_path = output.with_extension("part.mp4");
        let args = build_encode_args(
            footage_path,
            &narration.audio_path,
            &part_path,
            video.width,
            video.height,
            narration.duration_sec,
            loops,
            title,
            &narration.text,
            &self.settings,
        );

        if let Err(err) = self.runner.run(&args).await {
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(err.into());
        }

        tokio::fs::rename(&part_path, output).await.map_err(|e| {
            PipelineError::Render(format!("Failed to finalize output file: {}", e))
        })?;

        let duration_sec = INTRO_DURATION_SEC + narration.duration_sec;
        info!(
            "Rendered {} ({:.2}s, {}x{})",
            output.display(),
            duration_sec,
            video.width,
            video.height
        );

        Ok(ComposedVideo {
            path: output.to_path_buf(),
            duration_sec,
            width: video.width,
            height: video.height,
        })
    }
}

/// Number of full footage copies to concatenate before trimming.
///
/// `floor(D / F) + 1` when the footage is shorter than the narration,
/// otherwise 1; the concatenation is always trimmed back to exactly the
/// narration duration.
pub fn loop_count(narration_sec: TimeSec, footage_sec: TimeSec) -> PipelineResult<u32> {
    if footage_sec <= 0.0 {
        return Err(PipelineError::Render(
            "Footage has zero duration".to_string(),
        ));
    }
    if footage_sec >= narration_sec {
        return Ok(1);
    }
    Ok((narration_sec / footage_sec).floor() as u32 + 1)
}

/// Builds the full ffmpeg argument list for the composite encode.
#[allow(clippy::too_many_arguments)]
fn build_encode_args(
    footage: &Path,
    narration_audio: &Path,
    output: &Path,
    width: u32,
    height: u32,
    narration_sec: TimeSec,
    loops: u32,
    title: &str,
    caption: &str,
    settings: &RenderSettings,
) -> Vec<String> {
    let filter = build_filter_graph(width, height, narration_sec, title, caption, settings.fps);
    let total_sec = INTRO_DURATION_SEC + narration_sec;

    vec![
        // loops copies total: the input plays once plus (loops - 1) repeats
        "-stream_loop".to_string(),
        (loops - 1).to_string(),
        "-i".to_string(),
        footage.to_string_lossy().to_string(),
        "-i".to_string(),
        narration_audio.to_string_lossy().to_string(),
        "-filter_complex".to_string(),
        filter,
        "-map".to_string(),
        "[vout]".to_string(),
        "-map".to_string(),
        "[aout]".to_string(),
        "-c:v".to_string(),
        settings.video_codec.clone(),
        "-preset".to_string(),
        settings.preset.clone(),
        "-crf".to_string(),
        settings.crf.to_string(),
        "-c:a".to_string(),
        settings.audio_codec.clone(),
        "-b:a".to_string(),
        settings.audio_bitrate.clone(),
        "-r".to_string(),
        settings.fps.to_string(),
        "-t".to_string(),
        format!("{:.3}", total_sec),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-y".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Assembles the filter graph: trimmed/looped body, intro card, concat,
/// caption overlay, delayed narration audio.
fn build_filter_graph(
    width: u32,
    height: u32,
    narration_sec: TimeSec,
    title: &str,
    caption: &str,
    fps: u32,
) -> String {
    let caption_chars = max_caption_chars(width);
    let wrapped = wrap_text(caption, caption_chars);
    let title_text = escape_drawtext_value(title);
    let caption_text = escape_drawtext_value(&wrapped);
    let delay_ms = (INTRO_DURATION_SEC * 1000.0).round() as u64;

    format!(
        "[0:v]fps={fps},scale={width}:{height},trim=duration={dur:.3},setpts=PTS-STARTPTS[body];\
         color=c=0x0a0a14:s={width}x{height}:r={fps}:d={intro:.3},\
         drawtext=text='{title_text}':fontcolor=white:fontsize={title_size}:\
         x=(w-text_w)/2:y=(h-text_h)/2[intro];\
         [intro][body]concat=n=2:v=1:a=0[joined];\
         [joined]drawtext=text='{caption_text}':fontcolor=white:fontsize={caption_size}:\
         box=1:boxcolor=black@0.5:boxborderw=12:x=(w-text_w)/2:y=h*0.78[vout];\
         [1:a]adelay={delay_ms}:all=1[aout]",
        dur = narration_sec,
        intro = INTRO_DURATION_SEC,
        title_size = TITLE_FONT_SIZE,
        caption_size = CAPTION_FONT_SIZE,
    )
}

/// Maximum caption characters per line for a given frame width
fn max_caption_chars(frame_width: u32) -> usize {
    let usable = frame_width as f64 * CAPTION_WIDTH_RATIO;
    let glyph = CAPTION_FONT_SIZE as f64 * GLYPH_WIDTH_RATIO;
    (usable / glyph).floor().max(1.0) as usize
}

/// Word-wraps text to at most `max_chars` per line. A single word longer
/// than `max_chars` is hard-split so no line can exceed the limit.
fn wrap_text(text: &str, max_chars: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if word.chars().count() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let chars: Vec<char> = word.chars().collect();
            let mut pieces = chars.chunks(max_chars).peekable();
            while let Some(piece) = pieces.next() {
                if pieces.peek().is_some() {
                    lines.push(piece.iter().collect());
                } else {
                    current = piece.iter().collect();
                }
            }
            continue;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };

        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}

/// FFmpeg filtergraphs treat `:` and `,` as separators and `\` as an
/// escape character; drawtext additionally expands `%{...}` expressions.
/// User-provided text must be treated as literal.
fn escape_drawtext_value(raw: &str) -> String {
    raw.replace('\\', r"\\")
        .replace(':', r"\:")
        .replace(',', r"\,")
        .replace('\'', r"\'")
        .replace('%', r"\%")
}
