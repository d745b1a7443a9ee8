//! Compositor/stitcher: ordered assembly of per-block clips into one
//! final video, with subtitle burn-in and audio muxing.
//!
//! Planning is pure and separated from execution so ordering and
//! skip-policy can be tested without FFmpeg. The expensive composite and
//! concat passes are kept separable from the subtitle pass: re-rendering
//! subtitles never re-runs composition.

use std::path::{Path, PathBuf};

use sreel_models::{Project, RenderSettings};
use tokio::fs;
use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{media_duration, probe_media};
use crate::reconcile::{reconcile_to_audio, ReconcilePlan};

/// The visual layer available for a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisualSource {
    /// A video clip, reconciled to the audio duration by loop+trim
    Video(PathBuf),
    /// A still image, held for the full audio duration
    Still(PathBuf),
}

/// Everything needed to render one block's clip.
#[derive(Debug, Clone)]
pub struct BlockClipPlan {
    /// Block index; plans are strictly ascending by this
    pub index: usize,
    /// Ordered audio sub-clip paths
    pub audio: Vec<PathBuf>,
    pub visual: VisualSource,
}

/// Outcome of a composition run.
#[derive(Debug, Clone)]
pub struct ComposeReport {
    /// Number of block clips in the final video
    pub blocks_composed: usize,
    /// Block indices skipped for missing assets
    pub skipped: Vec<usize>,
    /// Total audio-track duration in seconds
    pub total_duration: f64,
}

/// Build the ordered clip list for a project.
///
/// Blocks are taken strictly by ascending index — asynchronous job
/// completion order never affects assembly order. A block missing its
/// audio or visual assets is skipped with a warning; zero assemblable
/// blocks is a fatal compose error.
pub fn plan_composition(
    project: &Project,
    project_root: impl AsRef<Path>,
) -> MediaResult<(Vec<BlockClipPlan>, Vec<usize>)> {
    let root = project_root.as_ref();
    let mut plans = Vec::new();
    let mut skipped = Vec::new();

    let mut blocks: Vec<_> = project.blocks.iter().collect();
    blocks.sort_by_key(|b| b.index);

    for block in blocks {
        let audio: Vec<PathBuf> = block.audio.iter().map(|r| root.join(r)).collect();
        if audio.is_empty() || audio.iter().any(|p| !p.exists()) {
            warn!(block = block.index, "Skipping block with missing audio");
            skipped.push(block.index);
            continue;
        }

        let visual = match &block.video {
            Some(video_ref) if root.join(video_ref).exists() => {
                VisualSource::Video(root.join(video_ref))
            }
            _ => match &block.image {
                Some(image_ref) if root.join(image_ref).exists() => {
                    VisualSource::Still(root.join(image_ref))
                }
                _ => {
                    warn!(block = block.index, "Skipping block with missing visual");
                    skipped.push(block.index);
                    continue;
                }
            },
        };

        plans.push(BlockClipPlan {
            index: block.index,
            audio,
            visual,
        });
    }

    if plans.is_empty() {
        return Err(MediaError::NothingToCompose);
    }

    Ok((plans, skipped))
}

/// Compose the planned block clips into one silent video.
///
/// Each block's visual is reconciled to its audio duration (the timing
/// invariant), scaled into the canonical portrait frame, and the clips
/// are concatenated in plan order.
pub async fn compose_blocks(
    plans: &[BlockClipPlan],
    skipped: &[usize],
    settings: &RenderSettings,
    output: impl AsRef<Path>,
) -> MediaResult<ComposeReport> {
    let output = output.as_ref();
    if plans.is_empty() {
        return Err(MediaError::NothingToCompose);
    }

    let temp_dir = tempfile::tempdir()?;
    let mut clip_paths = Vec::with_capacity(plans.len());
    let mut total_duration = 0.0;

    for plan in plans {
        let clip_path = temp_dir.path().join(format!("block_{}.mp4", plan.index));
        let audio_duration = sum_durations(&plan.audio).await?;
        total_duration += audio_duration;

        match &plan.visual {
            VisualSource::Video(video) => {
                let visual_duration = media_duration(video).await?;
                if visual_duration <= 0.0 {
                    return Err(MediaError::ZeroDurationClip(video.clone()));
                }
                let reconcile = ReconcilePlan::new(visual_duration, audio_duration)?;
                reconcile_to_audio(video, &clip_path, &reconcile, settings).await?;
            }
            VisualSource::Still(image) => {
                render_still(image, &clip_path, audio_duration, settings).await?;
            }
        }

        clip_paths.push(clip_path);
    }

    concat_clips(&clip_paths, settings, output, temp_dir.path()).await?;

    info!(
        blocks = plans.len(),
        duration = total_duration,
        output = %output.display(),
        "Composed block clips"
    );

    Ok(ComposeReport {
        blocks_composed: plans.len(),
        skipped: skipped.to_vec(),
        total_duration,
    })
}

/// Concatenate every block's audio sub-clips, in block order, into one
/// full audio track for muxing.
pub async fn concat_block_audio(
    plans: &[BlockClipPlan],
    settings: &RenderSettings,
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    let output = output.as_ref();
    let temp_dir = tempfile::tempdir()?;

    let inputs: Vec<&PathBuf> = plans.iter().flat_map(|p| p.audio.iter()).collect();
    if inputs.is_empty() {
        return Err(MediaError::NothingToCompose);
    }

    let list_path = temp_dir.path().join("audio.txt");
    write_concat_list(&list_path, inputs.iter().map(|p| p.as_path())).await?;

    let cmd = FfmpegCommand::with_output(output)
        .input_with_args(["-f", "concat", "-safe", "0"], &list_path)
        .audio_codec(settings.audio_codec.clone());

    FfmpegRunner::new().run(&cmd).await
}

/// Burn an SRT file into a composed video as a separate encoding pass.
pub async fn burn_subtitles(
    input: impl AsRef<Path>,
    srt: impl AsRef<Path>,
    output: impl AsRef<Path>,
    settings: &RenderSettings,
) -> MediaResult<()> {
    let srt = srt.as_ref();
    if !srt.exists() {
        return Err(MediaError::FileNotFound(srt.to_path_buf()));
    }

    let filter = format!("subtitles={}", escape_filter_path(srt));
    let cmd = FfmpegCommand::new(input.as_ref(), output.as_ref())
        .video_filter(filter)
        .output_args(settings.to_output_args());

    FfmpegRunner::new().run(&cmd).await
}

/// Mux a composed video against the full audio track.
///
/// Video is stream-copied; audio is encoded to AAC; writing stops at the
/// shortest stream.
pub async fn mux_audio(
    video: impl AsRef<Path>,
    audio: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    let video = video.as_ref();
    let audio = audio.as_ref();
    if !video.exists() {
        return Err(MediaError::FileNotFound(video.to_path_buf()));
    }
    if !audio.exists() {
        return Err(MediaError::FileNotFound(audio.to_path_buf()));
    }

    let cmd = FfmpegCommand::with_output(output.as_ref())
        .input(video)
        .input(audio)
        .output_args(["-c:v", "copy", "-c:a", "aac"])
        .shortest();

    FfmpegRunner::new().run(&cmd).await
}

/// Stitch independently pre-rendered block videos in a single filter-graph
/// pass: scale each input to the canonical frame, then concat, avoiding a
/// re-encode per clip.
pub async fn stitch_prerendered(
    inputs: &[PathBuf],
    settings: &RenderSettings,
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    if inputs.is_empty() {
        return Err(MediaError::NothingToCompose);
    }

    let mut cmd = FfmpegCommand::with_output(output.as_ref());
    for input in inputs {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.clone()));
        }
        cmd = cmd.input(input);
    }

    let mut filter_parts: Vec<String> = Vec::with_capacity(inputs.len() + 1);
    let mut concat_labels = String::new();
    for i in 0..inputs.len() {
        filter_parts.push(format!(
            "[{i}:v:0]{scale}[v{i}]",
            scale = settings.canonical_scale_filter()
        ));
        concat_labels.push_str(&format!("[v{i}]"));
    }
    filter_parts.push(format!(
        "{concat_labels}concat=n={}:v=1:a=0[outv]",
        inputs.len()
    ));

    let cmd = cmd
        .filter_complex(filter_parts.join(";"))
        .map("[outv]")
        .output_args(settings.to_output_args());

    FfmpegRunner::new().run(&cmd).await
}

/// Render a still image as a silent clip of the given duration.
async fn render_still(
    image: &Path,
    output: &Path,
    duration: f64,
    settings: &RenderSettings,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::with_output(output)
        .input_with_args(["-loop", "1"], image)
        .duration(duration)
        .video_filter(settings.canonical_scale_filter())
        .no_audio()
        .output_args(settings.to_output_args());

    FfmpegRunner::new().run(&cmd).await
}

/// Concatenate silent clips via the concat demuxer, re-encoding once.
async fn concat_clips(
    clips: &[PathBuf],
    settings: &RenderSettings,
    output: &Path,
    work_dir: &Path,
) -> MediaResult<()> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).await?;
    }

    let list_path = work_dir.join("concat.txt");
    write_concat_list(&list_path, clips.iter().map(|p| p.as_path())).await?;

    let cmd = FfmpegCommand::with_output(output)
        .input_with_args(["-f", "concat", "-safe", "0"], &list_path)
        .no_audio()
        .output_args(settings.to_output_args());

    FfmpegRunner::new().run(&cmd).await
}

/// Write a concat-demuxer file list.
async fn write_concat_list<'a>(
    path: &Path,
    entries: impl Iterator<Item = &'a Path>,
) -> MediaResult<()> {
    let mut list = String::new();
    for entry in entries {
        // Single quotes in paths are closed, escaped, reopened
        let escaped = entry.to_string_lossy().replace('\'', "'\\''");
        list.push_str(&format!("file '{escaped}'\n"));
    }
    fs::write(path, list).await?;
    Ok(())
}

/// Escape a path for use inside an FFmpeg filter argument.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Sum probed durations of a block's audio sub-clips.
async fn sum_durations(paths: &[PathBuf]) -> MediaResult<f64> {
    let mut total = 0.0;
    for path in paths {
        total += probe_media(path).await?.duration;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sreel_models::{Block, BlockStatus};
    use std::fs::File;
    use tempfile::TempDir;

    fn project_with_assets(dir: &TempDir, blocks: usize) -> Project {
        let mut project = Project::new("p", "", vec![]);
        for i in 0..blocks {
            let mut block = Block::new(i, format!("line {i}"));
            let audio_ref = format!("media/audio/p_{}_1.wav", i + 1);
            let video_ref = format!("media/video/p_{}.mp4", i + 1);
            touch(dir, &audio_ref);
            touch(dir, &video_ref);
            block.audio = vec![audio_ref];
            block.video = Some(video_ref);
            block.status = BlockStatus::Ready;
            project.blocks.push(block);
        }
        project
    }

    fn touch(dir: &TempDir, rel: &str) {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        File::create(path).unwrap();
    }

    #[test]
    fn test_plan_ordering_ignores_block_vec_order() {
        let dir = TempDir::new().unwrap();
        let mut project = project_with_assets(&dir, 3);
        // Simulate out-of-order completion by shuffling the vec
        project.blocks.swap(0, 2);

        let (plans, skipped) = plan_composition(&project, dir.path()).unwrap();
        let indices: Vec<usize> = plans.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(skipped.is_empty());
    }

    #[test]
    fn test_plan_skips_blocks_missing_assets() {
        let dir = TempDir::new().unwrap();
        let mut project = project_with_assets(&dir, 3);
        // Break block 1's visual
        project.blocks[1].video = Some("media/video/missing.mp4".to_string());
        project.blocks[1].image = None;

        let (plans, skipped) = plan_composition(&project, dir.path()).unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(skipped, vec![1]);
    }

    #[test]
    fn test_plan_falls_back_to_still_image() {
        let dir = TempDir::new().unwrap();
        let mut project = project_with_assets(&dir, 1);
        project.blocks[0].video = None;
        touch(&dir, "media/image/p_1.png");
        project.blocks[0].image = Some("media/image/p_1.png".to_string());

        let (plans, _) = plan_composition(&project, dir.path()).unwrap();
        assert!(matches!(plans[0].visual, VisualSource::Still(_)));
    }

    #[test]
    fn test_zero_assemblable_blocks_is_fatal() {
        let dir = TempDir::new().unwrap();
        let project = Project::new("p", "", vec!["only line".into()]);
        let err = plan_composition(&project, dir.path()).unwrap_err();
        assert!(matches!(err, MediaError::NothingToCompose));
    }

    #[test]
    fn test_escape_filter_path() {
        let escaped = escape_filter_path(Path::new("/a/b:c's.srt"));
        assert_eq!(escaped, "/a/b\\:c\\'s.srt");
    }

    #[tokio::test]
    async fn test_concat_list_quotes_paths() {
        let dir = TempDir::new().unwrap();
        let list = dir.path().join("list.txt");
        let clips = [PathBuf::from("/tmp/a.mp4"), PathBuf::from("/tmp/o'b.mp4")];
        write_concat_list(&list, clips.iter().map(|p| p.as_path()))
            .await
            .unwrap();
        let content = std::fs::read_to_string(&list).unwrap();
        assert!(content.contains("file '/tmp/a.mp4'\n"));
        assert!(content.contains("'\\''"));
    }
}
