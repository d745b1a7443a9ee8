//! Final-render binary: subtitles, composition, burn-in and mux for a
//! project whose block assets are already on disk.
//!
//! Asset generation runs inside the embedding application, which wires
//! concrete providers into `BlockProcessor`; this entry point covers the
//! offline tail of the pipeline.

use anyhow::{bail, Context};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sreel_media::{
    burn_subtitles, check_ffmpeg, check_ffprobe, compose_blocks, concat_block_audio, mux_audio,
    plan_composition,
};
use sreel_pipeline::{write_subtitles, PipelineConfig};
use sreel_store::ProjectStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("sreel=info".parse().expect("static directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    if let Err(e) = run().await {
        error!("Render failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let Some(project_name) = std::env::args().nth(1) else {
        bail!("usage: sreel-pipeline <project-name>");
    };

    check_ffmpeg().context("ffmpeg not available")?;
    check_ffprobe().context("ffprobe not available")?;

    let config = PipelineConfig::from_env();
    info!(projects_dir = %config.projects_dir.display(), "Starting render");

    let store = ProjectStore::new(&config.projects_dir);
    let project = store.load(&project_name).await?;
    let layout = store.layout(&project_name);

    let srt_path = write_subtitles(&project, &layout).await?;

    let (plans, skipped) = plan_composition(&project, layout.root())?;
    let silent = layout.final_dir().join("video_silent.mp4");
    let report = compose_blocks(&plans, &skipped, &config.render, &silent).await?;
    info!(
        blocks = report.blocks_composed,
        skipped = report.skipped.len(),
        duration = report.total_duration,
        "Composition complete"
    );

    let visual = if config.burn_subtitles {
        let subtitled = layout.final_dir().join("video_subtitled.mp4");
        burn_subtitles(&silent, &srt_path, &subtitled, &config.render).await?;
        subtitled
    } else {
        silent
    };

    let audio_track = layout.final_dir().join("audio.m4a");
    concat_block_audio(&plans, &config.render, &audio_track).await?;

    let output = layout.final_output();
    mux_audio(&visual, &audio_track, &output).await?;

    info!(output = %output.display(), "Final video written");
    Ok(())
}
