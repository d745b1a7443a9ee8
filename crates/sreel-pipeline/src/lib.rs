//! Orchestration core: the per-block generation state machine, the
//! background job poller, subtitle assembly and final composition glue.
//!
//! Provider implementations are injected through the `sreel-providers`
//! traits; this crate never talks to a concrete third-party API itself.

pub mod audio;
pub mod config;
pub mod error;
mod fetch;
pub mod poller;
pub mod processor;
pub mod subtitles;

pub use audio::{split_into_subclips, synthesize_block_audio};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use poller::{JobHandle, JobPoller};
pub use processor::{BatchReport, BlockOutcome, BlockProcessor, RegenFlags};
pub use subtitles::{subtitle_entries, write_subtitles};
