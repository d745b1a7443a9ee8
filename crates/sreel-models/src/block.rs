//! Narration blocks and their generation state machine.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a block acquires its visual asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockMode {
    /// Search a stock-footage provider and download the best candidate.
    #[default]
    SearchVideo,
    /// Generate a still image, then animate it through a video-generation job.
    GenerateImage,
    /// Submit a text-to-video generation job directly.
    GenerateVideo,
    /// The user supplies the visual asset out of band.
    Manual,
}

impl BlockMode {
    /// Whether this mode hands off to the asynchronous job poller.
    pub fn uses_generation_job(&self) -> bool {
        matches!(self, BlockMode::GenerateImage | BlockMode::GenerateVideo)
    }
}

impl fmt::Display for BlockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlockMode::SearchVideo => "search_video",
            BlockMode::GenerateImage => "generate_image",
            BlockMode::GenerateVideo => "generate_video",
            BlockMode::Manual => "manual",
        };
        write!(f, "{s}")
    }
}

/// Cached visual-strategy decision for a block.
///
/// Set the first time a block's visual step runs and honored thereafter;
/// cleared only by an explicit visual-regenerate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VisualMethod {
    Search,
    Generate,
}

/// Block state in the per-block generation state machine.
///
/// `Ready`, `Failed` and `TimedOut` are terminal for a given regeneration
/// request; a fresh regenerate re-enters at `New`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    /// No processing attempted for the current request
    #[default]
    New,
    /// TTS sub-clips are being synthesized
    AcquiringAudio,
    /// Visual asset acquisition in progress (search or image generation)
    AcquiringVisual,
    /// A generation job is being submitted to the provider
    SubmittingJob,
    /// A generation job is in flight, awaiting the poller
    JobPending,
    /// The job produced a result which is being downloaded
    JobReady,
    /// All assets for this block are on disk
    Ready,
    /// An acquisition or submission step failed
    Failed,
    /// The generation job exceeded its attempt ceiling
    TimedOut,
}

impl BlockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockStatus::New => "new",
            BlockStatus::AcquiringAudio => "acquiring_audio",
            BlockStatus::AcquiringVisual => "acquiring_visual",
            BlockStatus::SubmittingJob => "submitting_job",
            BlockStatus::JobPending => "job_pending",
            BlockStatus::JobReady => "job_ready",
            BlockStatus::Ready => "ready",
            BlockStatus::Failed => "failed",
            BlockStatus::TimedOut => "timed_out",
        }
    }

    /// Terminal for the current regeneration request.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BlockStatus::Ready | BlockStatus::Failed | BlockStatus::TimedOut
        )
    }

    /// A visual asset may still arrive asynchronously.
    pub fn has_visual_pending(&self) -> bool {
        matches!(
            self,
            BlockStatus::SubmittingJob | BlockStatus::JobPending | BlockStatus::JobReady
        )
    }
}

impl fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One narration segment of a project's script, with its own assets.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Block {
    /// Position in the script; contiguous from 0, stable once assigned
    pub index: usize,

    /// Narration text
    pub text: String,

    /// Speaking character, when the script distinguishes voices
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,

    /// Scene descriptor used as the image/video prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,

    /// Visual acquisition strategy
    #[serde(default)]
    pub mode: BlockMode,

    /// Ordered audio sub-clip references, relative to the project root.
    /// Order matches the block's subtitle emission order.
    #[serde(default)]
    pub audio: Vec<String>,

    /// Generated still image reference, relative to the project root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Visual clip reference, relative to the project root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,

    /// Last successfully completed step
    #[serde(default)]
    pub status: BlockStatus,

    /// Provider job id while a generation job is in flight
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_job_id: Option<String>,

    /// Cached search-vs-generate decision; never re-decided implicitly
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_generation_method: Option<VisualMethod>,
}

impl Block {
    /// Create a fresh block at the given position.
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            character: None,
            scene: None,
            mode: BlockMode::default(),
            audio: Vec::new(),
            image: None,
            video: None,
            status: BlockStatus::New,
            generation_job_id: None,
            video_generation_method: None,
        }
    }

    /// Prompt used for visual acquisition: the scene descriptor when
    /// present, otherwise the narration text itself.
    pub fn visual_prompt(&self) -> &str {
        self.scene.as_deref().unwrap_or(&self.text)
    }

    /// Whether every audio sub-clip reference is present.
    pub fn has_audio(&self) -> bool {
        !self.audio.is_empty()
    }

    /// Whether a visual clip reference is present.
    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    /// Reset per-request state for a regeneration pass.
    pub fn reset_for_regen(&mut self, regen_audio: bool, regen_visual: bool) {
        self.status = BlockStatus::New;
        if regen_audio {
            self.audio.clear();
        }
        if regen_visual {
            self.image = None;
            self.video = None;
            self.generation_job_id = None;
            self.video_generation_method = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminality() {
        assert!(BlockStatus::Ready.is_terminal());
        assert!(BlockStatus::Failed.is_terminal());
        assert!(BlockStatus::TimedOut.is_terminal());
        assert!(!BlockStatus::JobPending.is_terminal());
        assert!(!BlockStatus::New.is_terminal());
    }

    #[test]
    fn test_mode_job_handoff() {
        assert!(BlockMode::GenerateImage.uses_generation_job());
        assert!(BlockMode::GenerateVideo.uses_generation_job());
        assert!(!BlockMode::SearchVideo.uses_generation_job());
        assert!(!BlockMode::Manual.uses_generation_job());
    }

    #[test]
    fn test_visual_prompt_prefers_scene() {
        let mut block = Block::new(0, "Hello world");
        assert_eq!(block.visual_prompt(), "Hello world");
        block.scene = Some("a rainy street at night".to_string());
        assert_eq!(block.visual_prompt(), "a rainy street at night");
    }

    #[test]
    fn test_regen_reset_clears_only_requested_assets() {
        let mut block = Block::new(2, "text");
        block.audio = vec!["media/audio/p_3_1.wav".to_string()];
        block.video = Some("media/video/p_3.mp4".to_string());
        block.status = BlockStatus::Ready;
        block.video_generation_method = Some(VisualMethod::Search);

        block.reset_for_regen(false, true);
        assert_eq!(block.status, BlockStatus::New);
        assert!(block.has_audio());
        assert!(!block.has_video());
        assert!(block.video_generation_method.is_none());
    }
}
