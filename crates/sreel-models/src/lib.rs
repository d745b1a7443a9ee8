//! Shared data models for the shortreel pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Projects and their narration blocks
//! - The per-block generation state machine
//! - Asynchronous generation jobs
//! - Render/encoding settings for the final artifact
//! - SRT subtitle records

pub mod block;
pub mod job;
pub mod project;
pub mod render;
pub mod srt;

// Re-export common types
pub use block::{Block, BlockMode, BlockStatus, VisualMethod};
pub use job::{GenerationJob, JobId, JobStatus};
pub use project::Project;
pub use render::RenderSettings;
pub use srt::{format_srt_timestamp, render_srt, SrtEntry};
