//! On-disk layout of a project directory.
//!
//! ```text
//! <projects_dir>/<name>/
//!   script.json
//!   subtitles.srt
//!   media/audio/<name>_<block+1>_<sub+1>.wav
//!   media/image/<name>_<block+1>.png
//!   media/video/<name>_<block+1>.mp4
//!   media/final/output.mp4
//! ```

use std::path::{Path, PathBuf};

/// Resolved paths for one project directory.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
    name: String,
}

impl ProjectLayout {
    /// Layout for `<projects_dir>/<name>`.
    pub fn new(projects_dir: impl AsRef<Path>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            root: projects_dir.as_ref().join(&name),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn script_json(&self) -> PathBuf {
        self.root.join("script.json")
    }

    pub fn subtitles_srt(&self) -> PathBuf {
        self.root.join("subtitles.srt")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.root.join("media").join("audio")
    }

    pub fn image_dir(&self) -> PathBuf {
        self.root.join("media").join("image")
    }

    pub fn video_dir(&self) -> PathBuf {
        self.root.join("media").join("video")
    }

    pub fn final_dir(&self) -> PathBuf {
        self.root.join("media").join("final")
    }

    pub fn final_output(&self) -> PathBuf {
        self.final_dir().join("output.mp4")
    }

    /// Audio sub-clip file name: `<name>_<block+1>_<sub+1>.wav`.
    pub fn audio_ref(&self, block_index: usize, sub_index: usize) -> String {
        format!(
            "media/audio/{}_{}_{}.wav",
            self.name,
            block_index + 1,
            sub_index + 1
        )
    }

    /// Image file name: `<name>_<block+1>.png`.
    pub fn image_ref(&self, block_index: usize) -> String {
        format!("media/image/{}_{}.png", self.name, block_index + 1)
    }

    /// Video clip file name: `<name>_<block+1>.mp4`.
    pub fn video_ref(&self, block_index: usize) -> String {
        format!("media/video/{}_{}.mp4", self.name, block_index + 1)
    }

    /// Resolve a project-relative asset reference to an absolute path.
    pub fn resolve(&self, asset_ref: &str) -> PathBuf {
        self.root.join(asset_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_refs_are_one_based() {
        let layout = ProjectLayout::new("/tmp/projects", "night-city");
        assert_eq!(layout.audio_ref(0, 0), "media/audio/night-city_1_1.wav");
        assert_eq!(layout.audio_ref(2, 1), "media/audio/night-city_3_2.wav");
        assert_eq!(layout.video_ref(4), "media/video/night-city_5.mp4");
        assert_eq!(layout.image_ref(0), "media/image/night-city_1.png");
    }

    #[test]
    fn test_resolve_joins_under_root() {
        let layout = ProjectLayout::new("/tmp/projects", "p");
        let path = layout.resolve("media/video/p_1.mp4");
        assert_eq!(
            path,
            PathBuf::from("/tmp/projects/p/media/video/p_1.mp4")
        );
    }
}
