//! FFmpeg CLI wrapper for the composition pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building (multi-input) and running, with
//!   timeout and cancellation
//! - FFprobe media inspection
//! - Duration reconciliation (loop+trim a visual clip to its audio track)
//! - Composition: per-block clips, concatenation, subtitle burn-in, muxing

pub mod command;
pub mod compose;
pub mod error;
pub mod probe;
pub mod reconcile;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compose::{
    burn_subtitles, compose_blocks, concat_block_audio, mux_audio, plan_composition,
    stitch_prerendered, BlockClipPlan, ComposeReport, VisualSource,
};
pub use error::{MediaError, MediaResult};
pub use probe::{media_duration, probe_media, MediaInfo};
pub use reconcile::{reconcile_to_audio, ReconcilePlan};
