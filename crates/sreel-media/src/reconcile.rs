//! Duration reconciliation: align a visual clip's length to its audio.
//!
//! The core timing invariant of the whole pipeline: every composed block's
//! visual duration must equal its audio duration within one output frame.

use std::path::Path;

use sreel_models::RenderSettings;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Pure reconciliation plan for one block.
///
/// - visual shorter than audio: repeat the clip `ceil(audio/visual)` times
///   and trim the concatenation to exactly the audio duration
/// - visual at least as long: trim from the start, no offset logic
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcilePlan {
    /// Total playthroughs of the source clip (1 = no looping)
    pub loops: u32,
    /// Target duration in seconds; always the audio duration
    pub target: f64,
}

impl ReconcilePlan {
    /// Plan for the given visual and audio durations, both in seconds.
    pub fn new(visual: f64, audio: f64) -> MediaResult<Self> {
        if visual <= 0.0 {
            return Err(MediaError::InvalidMedia(format!(
                "visual duration must be positive, got {visual}"
            )));
        }
        let loops = if visual < audio {
            (audio / visual).ceil() as u32
        } else {
            1
        };
        Ok(Self {
            loops,
            target: audio,
        })
    }

    /// Whether the source clip needs repeating.
    pub fn needs_looping(&self) -> bool {
        self.loops > 1
    }

    /// Postcondition check: a rendered duration matches the target within
    /// the given tolerance (one output frame).
    pub fn matches_within(&self, rendered: f64, tolerance: f64) -> bool {
        (rendered - self.target).abs() <= tolerance
    }
}

/// Render a visual clip reconciled to its audio duration.
///
/// Looping uses `-stream_loop` on the input (N-1 extra playthroughs) and
/// the output is trimmed to the plan's target; the canonical scale filter
/// and output settings are applied in the same pass. The result is silent,
/// audio is attached at mux time.
pub async fn reconcile_to_audio(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    plan: &ReconcilePlan,
    settings: &RenderSettings,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();

    debug!(
        input = %input.display(),
        loops = plan.loops,
        target = plan.target,
        "Reconciling visual clip to audio duration"
    );

    let mut cmd = FfmpegCommand::with_output(output);
    if plan.needs_looping() {
        cmd = cmd.input_with_args(
            ["-stream_loop".to_string(), (plan.loops - 1).to_string()],
            input,
        );
    } else {
        cmd = cmd.input(input);
    }

    let cmd = cmd
        .duration(plan.target)
        .video_filter(settings.canonical_scale_filter())
        .no_audio()
        .output_args(settings.to_output_args());

    FfmpegRunner::new().run(&cmd).await
}
