//! Render settings for the final artifact.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 23;
/// Pixel format required for broad player compatibility
pub const PIXEL_FORMAT: &str = "yuv420p";

/// Canonical portrait resolution for shorts-style output
pub const CANONICAL_WIDTH: u32 = 1080;
pub const CANONICAL_HEIGHT: u32 = 1920;
/// Fixed output frame rate
pub const OUTPUT_FPS: u32 = 30;

/// Encoding parameters for composed output.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderSettings {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_codec")]
    pub codec: String,

    /// Encoding preset
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Output width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Output height in pixels
    #[serde(default = "default_height")]
    pub height: u32,

    /// Output frame rate
    #[serde(default = "default_fps")]
    pub fps: u32,
}

fn default_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_width() -> u32 {
    CANONICAL_WIDTH
}
fn default_height() -> u32 {
    CANONICAL_HEIGHT
}
fn default_fps() -> u32 {
    OUTPUT_FPS
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            codec: default_codec(),
            preset: default_preset(),
            crf: default_crf(),
            audio_codec: default_audio_codec(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
        }
    }
}

impl RenderSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// One output frame, in seconds. The duration-reconciliation
    /// postcondition tolerance.
    pub fn frame_tolerance(&self) -> f64 {
        1.0 / self.fps as f64
    }

    /// Scale-and-pad filter that letterboxes any input into the canonical
    /// portrait frame.
    pub fn canonical_scale_filter(&self) -> String {
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
            w = self.width,
            h = self.height
        )
    }

    /// Standard output arguments for composed video.
    pub fn to_output_args(&self) -> Vec<String> {
        vec![
            "-r".to_string(),
            self.fps.to_string(),
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-pix_fmt".to_string(),
            PIXEL_FORMAT.to_string(),
        ]
    }
}
