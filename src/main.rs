//! Autoreel CLI
//!
//! Thin clap front-end over the core pipeline: resolve configuration,
//! detect ffmpeg, run the five stages once, report the outcome.

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use autoreel::core::config::Config;
use autoreel::core::ffmpeg::{detect_system_ffmpeg, FFmpegRunner};
use autoreel::core::pipeline::{Pipeline, RunOutcome};
use autoreel::core::publish::PrivacyStatus;

/// Generate one narrated stock-footage short and optionally publish it
#[derive(Parser, Debug)]
#[command(name = "autoreel", version, about)]
struct Cli {
    /// Stock-footage search query
    #[arg(long)]
    query: Option<String>,

    /// Narration language code (e.g. "en")
    #[arg(long)]
    language: Option<String>,

    /// Search result-count hint (1-80)
    #[arg(long)]
    per_page: Option<u32>,

    /// Privacy level for the uploaded video
    #[arg(long, value_enum)]
    privacy: Option<PrivacyStatus>,

    /// Working directory for intermediates and the output
    #[arg(long)]
    work_dir: Option<std::path::PathBuf>,

    /// Use a fixed script from the pool instead of a random one
    #[arg(long)]
    script: Option<usize>,

    /// Keep the downloaded footage and narration audio after the run
    #[arg(long)]
    keep_intermediates: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();

    let mut config = Config::from_env().context("configuration")?;
    if let Some(query) = cli.query {
        config.query = query;
    }
    if let Some(language) = cli.language {
        config.language = language;
    }
    if let Some(per_page) = cli.per_page {
        config.per_page = per_page;
    }
    if let Some(privacy) = cli.privacy {
        config.privacy = privacy;
    }
    if let Some(work_dir) = cli.work_dir {
        config.work_dir = work_dir;
    }
    config.keep_intermediates = cli.keep_intermediates;

    let ffmpeg_info = detect_system_ffmpeg().context("ffmpeg detection")?;
    info!("Using ffmpeg {}", ffmpeg_info.version);

    let mut pipeline = Pipeline::new(config, FFmpegRunner::new(ffmpeg_info))?;
    if let Some(idx) = cli.script {
        pipeline = pipeline.with_script_index(idx);
    }

    match pipeline.run().await {
        Ok(RunOutcome::Published(record)) => {
            println!(
                "🎬 Video published: https://youtu.be/{} ({})",
                record.remote_id,
                record.privacy.as_str()
            );
            Ok(())
        }
        Ok(RunOutcome::SavedLocally(path)) => {
            println!("🎬 Video saved locally, not published: {}", path.display());
            Ok(())
        }
        Err(err) => {
            error!("Run failed: {}", err);
            Err(err.into())
        }
    }
}

fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("autoreel=info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .finish();

    // Avoid panics if already initialized (tests).
    let _ = tracing::subscriber::set_global_default(subscriber);
}
