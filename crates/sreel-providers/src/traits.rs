//! The four capability interfaces the pipeline orchestrates through.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::ProviderResult;

/// Opaque provider-assigned id for a submitted generation job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderJobId(pub String);

impl ProviderJobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Voice parameters for speech synthesis.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VoiceParams {
    /// Provider voice identifier
    pub voice_id: String,
    /// Playback speed multiplier
    #[serde(default = "default_speed")]
    pub speed: f32,
}

fn default_speed() -> f32 {
    1.0
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            voice_id: "default".to_string(),
            speed: 1.0,
        }
    }
}

/// Text-to-speech synthesis.
#[async_trait]
pub trait SpeechSynth: Send + Sync {
    /// Synthesize one narration sub-clip; returns the encoded audio bytes.
    async fn synthesize(&self, text: &str, voice: &VoiceParams) -> ProviderResult<Vec<u8>>;
}

/// Still-image generation from a text prompt.
#[async_trait]
pub trait ImageGen: Send + Sync {
    /// Generate an image; returns the URL of the rendered image.
    async fn generate(&self, prompt: &str) -> ProviderResult<String>;
}

/// One stock-footage search result.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoCandidate {
    /// Direct download URL for the video file
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Clip duration in seconds, when the provider reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Preview thumbnail URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl VideoCandidate {
    /// Portrait orientation, the target for shorts-style output.
    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }
}

/// Stock-footage search.
#[async_trait]
pub trait VideoSearch: Send + Sync {
    /// Search for candidate clips matching a query.
    async fn search(&self, query: &str) -> ProviderResult<Vec<VideoCandidate>>;
}

/// A long-running video generation request.
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    /// Text prompt describing the desired motion/scene
    pub prompt: String,
    /// Optional source image to animate (image-to-video)
    pub image_path: Option<PathBuf>,
}

impl SubmitRequest {
    pub fn text_to_video(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image_path: None,
        }
    }

    pub fn image_to_video(prompt: impl Into<String>, image_path: impl Into<PathBuf>) -> Self {
        Self {
            prompt: prompt.into(),
            image_path: Some(image_path.into()),
        }
    }
}

/// Poll outcome for a submitted generation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPoll {
    /// Still rendering
    Pending,
    /// Done; the payload is downloadable at this URL
    Ready(String),
    /// Provider-reported failure, terminal
    Failed(String),
}

/// Asynchronous video generation: submit now, poll until done.
#[async_trait]
pub trait VideoGen: Send + Sync {
    /// Provider name, for logs and job records.
    fn name(&self) -> &str;

    /// Submit a render request; returns the provider's job id, or an error
    /// when submission itself is rejected.
    async fn submit(&self, request: &SubmitRequest) -> ProviderResult<ProviderJobId>;

    /// Query the status of a previously submitted job.
    async fn poll(&self, id: &ProviderJobId) -> ProviderResult<JobPoll>;

    /// Attempt ceiling for polling this provider's jobs. Short-turnaround
    /// providers default to 100 attempts; slow renderers should override
    /// with a larger budget.
    fn poll_budget(&self) -> u32 {
        100
    }
}

/// Pick the best candidate for portrait composition: prefer portrait
/// orientation, then the widest (highest-quality) file.
pub fn best_candidate(candidates: &[VideoCandidate]) -> Option<&VideoCandidate> {
    let portrait = candidates
        .iter()
        .filter(|c| c.is_portrait())
        .max_by_key(|c| c.width);
    portrait.or_else(|| candidates.iter().max_by_key(|c| c.width))
}
