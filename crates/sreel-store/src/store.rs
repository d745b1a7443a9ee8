//! Atomic, per-project-serialized persistence for `script.json`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use sreel_models::Project;

use crate::error::{StoreError, StoreResult};
use crate::layout::ProjectLayout;

/// Project persistence with single-writer discipline per project.
///
/// Every save goes through a per-project async mutex and an atomic
/// write-temp-then-rename replace. Concurrent writers (block processor,
/// poller callbacks) serialize on the lock; the last complete write wins,
/// a partial write is never observable.
#[derive(Clone)]
pub struct ProjectStore {
    projects_dir: PathBuf,
    locks: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ProjectStore {
    pub fn new(projects_dir: impl AsRef<Path>) -> Self {
        Self {
            projects_dir: projects_dir.as_ref().to_path_buf(),
            locks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    /// Layout for a project, whether or not it exists yet.
    pub fn layout(&self, name: &str) -> ProjectLayout {
        ProjectLayout::new(&self.projects_dir, name)
    }

    fn write_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("project lock map poisoned");
        locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Create a new project from raw script text, one block per non-empty
    /// line. Refuses to overwrite an existing project.
    pub async fn create(
        &self,
        name: &str,
        theme: &str,
        script_text: &str,
    ) -> StoreResult<Project> {
        let name = slugify(name)?;
        let layout = self.layout(&name);

        if layout.script_json().exists() {
            return Err(StoreError::ProjectExists(name));
        }

        let lines = split_script_lines(script_text);
        let project = Project::new(&name, theme, lines);

        fs::create_dir_all(layout.audio_dir()).await?;
        fs::create_dir_all(layout.image_dir()).await?;
        fs::create_dir_all(layout.video_dir()).await?;
        fs::create_dir_all(layout.final_dir()).await?;

        self.save(&project).await?;
        info!(project = %name, blocks = project.blocks.len(), "Created project");
        Ok(project)
    }

    /// Load a project's persisted state.
    pub async fn load(&self, name: &str) -> StoreResult<Project> {
        let path = self.layout(name).script_json();
        let bytes = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::ProjectNotFound(name.to_string())
            } else {
                StoreError::Io(e)
            }
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Persist a project atomically, serialized against other writers.
    pub async fn save(&self, project: &Project) -> StoreResult<()> {
        let lock = self.write_lock(&project.name);
        let _guard = lock.lock().await;
        self.write_script_json(project).await
    }

    /// Load-modify-save under the project's write lock.
    ///
    /// This is the poller's write-back path: the closure sees the freshest
    /// persisted state, so an interleaved foreground save cannot be lost.
    pub async fn update<F>(&self, name: &str, mutate: F) -> StoreResult<Project>
    where
        F: FnOnce(&mut Project),
    {
        let lock = self.write_lock(name);
        let _guard = lock.lock().await;

        let mut project = self.load(name).await?;
        mutate(&mut project);
        self.write_script_json(&project).await?;
        Ok(project)
    }

    /// Load-modify-save a single block under the project's write lock.
    pub async fn update_block<F>(&self, name: &str, index: usize, mutate: F) -> StoreResult<Project>
    where
        F: FnOnce(&mut sreel_models::Block),
    {
        let lock = self.write_lock(name);
        let _guard = lock.lock().await;

        let mut project = self.load(name).await?;
        let block = project
            .block_mut(index)
            .ok_or_else(|| StoreError::BlockOutOfRange {
                project: name.to_string(),
                index,
            })?;
        mutate(block);
        self.write_script_json(&project).await?;
        Ok(project)
    }

    /// Remove the project tree. Callers must cancel the project's polling
    /// tasks first.
    pub async fn delete(&self, name: &str) -> StoreResult<()> {
        let layout = self.layout(name);
        if !layout.root().exists() {
            return Err(StoreError::ProjectNotFound(name.to_string()));
        }
        fs::remove_dir_all(layout.root()).await?;
        self.locks
            .lock()
            .expect("project lock map poisoned")
            .remove(name);
        info!(project = %name, "Deleted project");
        Ok(())
    }

    async fn write_script_json(&self, project: &Project) -> StoreResult<()> {
        let mut project = project.clone();
        project.touch();

        let path = self.layout(&project.name).script_json();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(&project)?;
        atomic_write(&path, &json).await?;
        debug!(project = %project.name, path = %path.display(), "Persisted script.json");
        Ok(())
    }
}

/// Write bytes to `path` through a `.part` temp file in the same directory,
/// fsync, then rename into place.
pub async fn atomic_write(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let tmp = match path.extension() {
        Some(ext) => path.with_extension(format!("{}.part", ext.to_string_lossy())),
        None => path.with_extension("part"),
    };

    let mut file = fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp, path).await?;
    Ok(())
}

/// Split raw script text into narration lines, dropping blanks.
pub fn split_script_lines(script: &str) -> Vec<String> {
    script
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalize a project name to a filesystem-safe slug.
fn slugify(name: &str) -> StoreResult<String> {
    let slug: String = name
        .trim()
        .to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if slug.is_empty() {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sreel_models::BlockStatus;
    use tempfile::TempDir;

    #[test]
    fn test_split_script_lines() {
        let lines = split_script_lines("Hello world\n\n  Second line  \nFinal line\n");
        assert_eq!(lines, vec!["Hello world", "Second line", "Final line"]);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Night City!").unwrap(), "night-city");
        assert!(slugify("!!!").is_err());
    }

    #[tokio::test]
    async fn test_create_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = ProjectStore::new(dir.path());

        let project = store
            .create("demo", "noir", "Hello world\nSecond line")
            .await
            .unwrap();
        assert_eq!(project.blocks.len(), 2);

        let loaded = store.load("demo").await.unwrap();
        assert_eq!(loaded.name, "demo");
        assert_eq!(loaded.blocks[1].text, "Second line");
        assert!(store.layout("demo").audio_dir().exists());
    }

    #[tokio::test]
    async fn test_create_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = ProjectStore::new(dir.path());

        store.create("demo", "", "line").await.unwrap();
        let err = store.create("demo", "", "other").await.unwrap_err();
        assert!(matches!(err, StoreError::ProjectExists(_)));
    }

    #[tokio::test]
    async fn test_update_block_persists() {
        let dir = TempDir::new().unwrap();
        let store = ProjectStore::new(dir.path());
        store.create("demo", "", "one\ntwo").await.unwrap();

        store
            .update_block("demo", 1, |block| {
                block.status = BlockStatus::Ready;
                block.video = Some("media/video/demo_2.mp4".to_string());
            })
            .await
            .unwrap();

        let loaded = store.load("demo").await.unwrap();
        assert_eq!(loaded.blocks[1].status, BlockStatus::Ready);
        assert!(loaded.blocks[1].has_video());
        // Other blocks untouched
        assert_eq!(loaded.blocks[0].status, BlockStatus::New);
    }

    #[tokio::test]
    async fn test_update_block_out_of_range() {
        let dir = TempDir::new().unwrap();
        let store = ProjectStore::new(dir.path());
        store.create("demo", "", "one").await.unwrap();

        let err = store.update_block("demo", 5, |_| {}).await.unwrap_err();
        assert!(matches!(err, StoreError::BlockOutOfRange { index: 5, .. }));
    }

    #[tokio::test]
    async fn test_atomic_write_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("script.json");
        atomic_write(&path, b"{}").await.unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.part").exists());
    }

    #[tokio::test]
    async fn test_concurrent_saves_never_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = ProjectStore::new(dir.path());
        store.create("demo", "", "one\ntwo\nthree").await.unwrap();

        let mut handles = Vec::new();
        for i in 0..3usize {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update_block("demo", i, |b| b.status = BlockStatus::Ready)
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let loaded = store.load("demo").await.unwrap();
        assert!(loaded
            .blocks
            .iter()
            .all(|b| b.status == BlockStatus::Ready));
    }
}
