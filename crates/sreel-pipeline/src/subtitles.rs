//! SRT subtitle assembly from per-block audio sub-clips.
//!
//! Timestamps are cumulative over the full audio track: each entry starts
//! exactly where the previous one ended, so the result is monotonic by
//! construction.

use std::path::PathBuf;

use sreel_media::media_duration;
use sreel_models::{render_srt, Project, SrtEntry};
use sreel_store::{atomic_write, ProjectLayout};
use tracing::info;

use crate::audio::split_into_subclips;
use crate::error::PipelineResult;

/// Build cumulative SRT entries from (sub-clip text, duration) pairs in
/// playback order.
pub fn subtitle_entries(subclips: &[(String, f64)]) -> Vec<SrtEntry> {
    let mut entries = Vec::with_capacity(subclips.len());
    let mut current = 0.0;
    for (seq0, (text, duration)) in subclips.iter().enumerate() {
        entries.push(SrtEntry::new(seq0 + 1, current, current + duration, text.as_str()));
        current += duration;
    }
    entries
}

/// Probe every block's audio sub-clips in order and write the project's
/// subtitle file. Blocks with no audio yet contribute no entries.
pub async fn write_subtitles(
    project: &Project,
    layout: &ProjectLayout,
) -> PipelineResult<PathBuf> {
    let mut blocks: Vec<_> = project.blocks.iter().collect();
    blocks.sort_by_key(|b| b.index);

    let mut subclips = Vec::new();
    for block in blocks {
        let texts = split_into_subclips(&block.text);
        for (i, audio_ref) in block.audio.iter().enumerate() {
            let duration = media_duration(layout.resolve(audio_ref)).await?;
            let text = texts
                .get(i)
                .cloned()
                .unwrap_or_else(|| block.text.clone());
            subclips.push((text, duration));
        }
    }

    let srt = render_srt(&subtitle_entries(&subclips));
    let path = layout.subtitles_srt();
    atomic_write(&path, srt.as_bytes()).await?;

    info!(
        project = %project.name,
        entries = subclips.len(),
        path = %path.display(),
        "Wrote subtitles"
    );
    Ok(path)
}
