//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use sreel_models::RenderSettings;
use sreel_providers::VoiceParams;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root directory holding one subdirectory per project
    pub projects_dir: PathBuf,
    /// Fixed interval between generation-job polls
    pub poll_interval: Duration,
    /// Voice parameters for narration synthesis
    pub voice: VoiceParams,
    /// Encoding parameters for all rendered output
    pub render: RenderSettings,
    /// Whether the final render burns subtitles into the video
    pub burn_subtitles: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            projects_dir: PathBuf::from("projects"),
            poll_interval: Duration::from_secs(10),
            voice: VoiceParams::default(),
            render: RenderSettings::default(),
            burn_subtitles: true,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            projects_dir: std::env::var("SREEL_PROJECTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("projects")),
            poll_interval: Duration::from_secs(
                std::env::var("SREEL_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            voice: VoiceParams {
                voice_id: std::env::var("SREEL_VOICE_ID")
                    .unwrap_or_else(|_| "default".to_string()),
                speed: std::env::var("SREEL_VOICE_SPEED")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1.0),
            },
            render: RenderSettings::default(),
            burn_subtitles: std::env::var("SREEL_BURN_SUBTITLES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
        }
    }
}
