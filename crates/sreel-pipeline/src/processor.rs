//! Per-block generation state machine.
//!
//! Each block advances `New → AcquiringAudio → AcquiringVisual →
//! SubmittingJob → JobPending → ... → Ready`, persisting after every
//! completed step. Steps whose assets already exist are skipped unless
//! regeneration is requested, so re-running a project converges instead
//! of re-spending provider calls.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use reqwest::Client;
use sreel_models::{Block, BlockMode, BlockStatus, VisualMethod};
use sreel_providers::{
    best_candidate, ImageGen, SpeechSynth, SubmitRequest, VideoGen, VideoSearch, VoiceParams,
};
use sreel_store::{ProjectLayout, ProjectStore};
use tracing::{error, info, warn};

use crate::audio::{audio_is_cached, synthesize_block_audio};
use crate::error::{PipelineError, PipelineResult};
use crate::fetch::fetch_asset;
use crate::poller::{JobHandle, JobPoller};

/// Which cached assets a processing request invalidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegenFlags {
    pub audio: bool,
    pub visual: bool,
}

impl RegenFlags {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            audio: true,
            visual: true,
        }
    }

    pub fn any(&self) -> bool {
        self.audio || self.visual
    }
}

/// Outcome of one block's processing pass.
#[derive(Debug)]
pub enum BlockOutcome {
    /// All assets on disk, nothing pending
    Ready,
    /// A generation job was handed to the poller
    JobSubmitted(JobHandle),
}

/// Per-batch outcome; failures are isolated per block, never aborting the
/// batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<usize>,
    /// Blocks whose visual is pending on a generation job
    pub pending: Vec<(usize, JobHandle)>,
    pub failed: Vec<(usize, String)>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drives blocks through the generation state machine.
pub struct BlockProcessor {
    store: Arc<ProjectStore>,
    speech: Arc<dyn SpeechSynth>,
    image_gen: Arc<dyn ImageGen>,
    video_search: Arc<dyn VideoSearch>,
    video_gen: Arc<dyn VideoGen>,
    poller: Arc<JobPoller>,
    client: Client,
    voice: VoiceParams,
    busy: Mutex<HashSet<(String, usize)>>,
}

impl BlockProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<ProjectStore>,
        speech: Arc<dyn SpeechSynth>,
        image_gen: Arc<dyn ImageGen>,
        video_search: Arc<dyn VideoSearch>,
        video_gen: Arc<dyn VideoGen>,
        poller: Arc<JobPoller>,
        voice: VoiceParams,
    ) -> Self {
        Self {
            store,
            speech,
            image_gen,
            video_search,
            video_gen,
            poller,
            client: Client::new(),
            voice,
            busy: Mutex::new(HashSet::new()),
        }
    }

    /// Process one block through audio and visual acquisition.
    ///
    /// A second concurrent call for the same block fails fast with
    /// `BlockBusy` and leaves the block's persisted state alone. On
    /// adapter failure the block's status is persisted as `Failed` and
    /// the error is returned.
    pub async fn process_block(
        &self,
        project: &str,
        index: usize,
        regen: RegenFlags,
    ) -> PipelineResult<BlockOutcome> {
        let _guard = self.claim(project, index)?;

        if regen.any() {
            self.store
                .update_block(project, index, |block| {
                    block.reset_for_regen(regen.audio, regen.visual)
                })
                .await?;
        }

        match self.run_steps(project, index, regen).await {
            Ok(outcome) => Ok(outcome),
            // A concurrency rejection is not a block failure; the other
            // caller still owns the block and its persisted status
            Err(e @ (PipelineError::BlockBusy(_) | PipelineError::AlreadyInFlight(_))) => Err(e),
            Err(e) => {
                self.mark_failed(project, index).await;
                Err(e)
            }
        }
    }

    /// Process every block in ascending index order, isolating failures.
    pub async fn process_all(&self, project: &str, regen: RegenFlags) -> PipelineResult<BatchReport> {
        let loaded = self.store.load(project).await?;
        let mut indices: Vec<usize> = loaded.blocks.iter().map(|b| b.index).collect();
        indices.sort_unstable();

        let mut report = BatchReport::default();
        for index in indices {
            match self.process_block(project, index, regen).await {
                Ok(BlockOutcome::Ready) => report.succeeded.push(index),
                Ok(BlockOutcome::JobSubmitted(handle)) => report.pending.push((index, handle)),
                Err(e) => {
                    warn!(project, block = index, error = %e, "Block failed, continuing batch");
                    report.failed.push((index, e.to_string()));
                }
            }
        }

        info!(
            project,
            succeeded = report.succeeded.len(),
            pending = report.pending.len(),
            failed = report.failed.len(),
            "Batch processing finished"
        );
        Ok(report)
    }

    async fn run_steps(
        &self,
        project: &str,
        index: usize,
        regen: RegenFlags,
    ) -> PipelineResult<BlockOutcome> {
        let layout = self.store.layout(project);
        let block = self.load_block(project, index).await?;

        self.audio_step(project, &layout, &block, regen.audio).await?;
        self.visual_step(project, &layout, &block, regen.visual).await
    }

    async fn load_block(&self, project: &str, index: usize) -> PipelineResult<Block> {
        let loaded = self.store.load(project).await?;
        loaded
            .blocks
            .iter()
            .find(|b| b.index == index)
            .cloned()
            .ok_or_else(|| {
                PipelineError::Store(sreel_store::StoreError::BlockOutOfRange {
                    project: project.to_string(),
                    index,
                })
            })
    }

    /// Synthesize the block's narration sub-clips, skipping entirely on a
    /// cache hit.
    async fn audio_step(
        &self,
        project: &str,
        layout: &ProjectLayout,
        block: &Block,
        regen: bool,
    ) -> PipelineResult<()> {
        if !regen && audio_is_cached(layout, block.index, &block.text) && block.has_audio() {
            info!(project, block = block.index, "Audio cached, skipping");
            return Ok(());
        }

        self.store
            .update_block(project, block.index, |b| {
                b.status = BlockStatus::AcquiringAudio
            })
            .await?;

        let refs = synthesize_block_audio(
            self.speech.as_ref(),
            &self.voice,
            layout,
            block.index,
            &block.text,
            regen,
        )
        .await?;

        self.store
            .update_block(project, block.index, |b| b.audio = refs)
            .await?;
        Ok(())
    }

    /// Acquire the block's visual, dispatching on its mode and the cached
    /// strategy decision.
    async fn visual_step(
        &self,
        project: &str,
        layout: &ProjectLayout,
        block: &Block,
        regen: bool,
    ) -> PipelineResult<BlockOutcome> {
        // Cache hit: a visual file already on disk is never re-acquired
        // without an explicit regenerate
        if !regen {
            if let Some(video_ref) = &block.video {
                if layout.resolve(video_ref).exists() {
                    info!(project, block = block.index, "Visual cached, skipping");
                    self.finish_ready(project, block.index).await?;
                    return Ok(BlockOutcome::Ready);
                }
            }
        }

        if block.mode == BlockMode::Manual {
            // The visual arrives out of band; whatever ref is present is
            // used at composition
            self.finish_ready(project, block.index).await?;
            return Ok(BlockOutcome::Ready);
        }

        // The strategy decision is made once and honored on every later
        // pass; only an explicit visual regenerate clears it
        let method = block.video_generation_method.unwrap_or(match block.mode {
            BlockMode::SearchVideo => VisualMethod::Search,
            BlockMode::GenerateImage | BlockMode::GenerateVideo => VisualMethod::Generate,
            BlockMode::Manual => unreachable!("manual handled above"),
        });
        if block.video_generation_method.is_none() {
            self.store
                .update_block(project, block.index, |b| {
                    b.video_generation_method = Some(method)
                })
                .await?;
        }

        match method {
            VisualMethod::Search => {
                self.search_visual(project, layout, block).await?;
                Ok(BlockOutcome::Ready)
            }
            VisualMethod::Generate => {
                let handle = self.generate_visual(project, layout, block, regen).await?;
                Ok(BlockOutcome::JobSubmitted(handle))
            }
        }
    }

    /// Stock-footage path: search, pick the best candidate, download.
    async fn search_visual(
        &self,
        project: &str,
        layout: &ProjectLayout,
        block: &Block,
    ) -> PipelineResult<()> {
        self.store
            .update_block(project, block.index, |b| {
                b.status = BlockStatus::AcquiringVisual
            })
            .await?;

        let query = block.visual_prompt();
        let candidates = self.video_search.search(query).await?;
        let best = best_candidate(&candidates).ok_or(PipelineError::NoResult(block.index))?;

        let video_ref = layout.video_ref(block.index);
        fetch_asset(&self.client, &best.url, layout.resolve(&video_ref)).await?;

        self.store
            .update_block(project, block.index, |b| {
                b.video = Some(video_ref.clone());
                b.status = BlockStatus::Ready;
            })
            .await?;
        info!(project, block = block.index, "Stock visual downloaded");
        Ok(())
    }

    /// Generation path: optional still image first, then a video
    /// generation job handed to the poller.
    async fn generate_visual(
        &self,
        project: &str,
        layout: &ProjectLayout,
        block: &Block,
        regen: bool,
    ) -> PipelineResult<JobHandle> {
        let prompt = block.visual_prompt().to_string();

        let request = if block.mode == BlockMode::GenerateImage {
            let image_ref = layout.image_ref(block.index);
            let image_path = layout.resolve(&image_ref);

            if regen || !image_path.exists() {
                self.store
                    .update_block(project, block.index, |b| {
                        b.status = BlockStatus::AcquiringVisual
                    })
                    .await?;
                let url = self.image_gen.generate(&prompt).await?;
                fetch_asset(&self.client, &url, &image_path).await?;
                self.store
                    .update_block(project, block.index, |b| {
                        b.image = Some(image_ref.clone())
                    })
                    .await?;
            }
            SubmitRequest::image_to_video(prompt.as_str(), image_path)
        } else {
            SubmitRequest::text_to_video(prompt.as_str())
        };

        // The poller persists SubmittingJob only after it has accepted the
        // request, so a rejected duplicate leaves the live job's status
        // untouched
        self.poller
            .submit(Arc::clone(&self.video_gen), project, block.index, request)
            .await
    }

    async fn finish_ready(&self, project: &str, index: usize) -> PipelineResult<()> {
        self.store
            .update_block(project, index, |b| b.status = BlockStatus::Ready)
            .await?;
        Ok(())
    }

    /// Persist the failure; status is the record, logging supplementary.
    async fn mark_failed(&self, project: &str, index: usize) {
        let result = self
            .store
            .update_block(project, index, |b| b.status = BlockStatus::Failed)
            .await;
        if let Err(e) = result {
            error!(project, block = index, error = %e, "Failed-status persist failed");
        }
    }

    fn claim(&self, project: &str, index: usize) -> PipelineResult<BusyGuard<'_>> {
        let key = (project.to_string(), index);
        let mut busy = self.busy.lock().expect("busy set poisoned");
        if !busy.insert(key.clone()) {
            return Err(PipelineError::BlockBusy(index));
        }
        Ok(BusyGuard {
            busy: &self.busy,
            key,
        })
    }
}

/// Releases the per-block claim on drop, including on the error paths.
struct BusyGuard<'a> {
    busy: &'a Mutex<HashSet<(String, usize)>>,
    key: (String, usize),
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.busy.lock().expect("busy set poisoned").remove(&self.key);
    }
}
