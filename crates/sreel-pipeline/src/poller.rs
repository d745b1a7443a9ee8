//! Background job poller.
//!
//! Bridges synchronous block processing to long-running provider render
//! jobs: submission is synchronous and returns a `JobHandle`; a spawned
//! task polls the provider at a fixed interval until the job resolves or
//! its attempt budget is exhausted, then writes the outcome back through
//! the store. The poller is plain injectable state owned by the
//! application root; nothing about it is global.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Client;
use sreel_models::{BlockStatus, GenerationJob, JobId, JobStatus};
use sreel_providers::{JobPoll, SubmitRequest, VideoGen};
use sreel_store::ProjectStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::fetch::fetch_asset;

/// Observer for a submitted generation job.
///
/// The receiver starts at `Pending` and receives exactly one terminal
/// status; callers that don't care may drop the handle, the polling task
/// runs to completion regardless.
#[derive(Debug)]
pub struct JobHandle {
    pub job_id: JobId,
    pub block_index: usize,
    pub completion: watch::Receiver<JobStatus>,
}

impl JobHandle {
    /// Wait for the job's terminal status.
    pub async fn wait(&mut self) -> JobStatus {
        loop {
            let status = *self.completion.borrow();
            if status.is_terminal() {
                return status;
            }
            // Sender dropped without a terminal send means the task was
            // aborted by shutdown
            if self.completion.changed().await.is_err() {
                return *self.completion.borrow();
            }
        }
    }

    /// Wait for completion, mapping non-ready outcomes to errors.
    pub async fn wait_ready(&mut self) -> PipelineResult<()> {
        match self.wait().await {
            JobStatus::Ready => Ok(()),
            JobStatus::TimedOut => Err(PipelineError::JobTimedOut(self.block_index)),
            JobStatus::Failed => Err(PipelineError::NoResult(self.block_index)),
            JobStatus::Pending => Err(PipelineError::Transient(
                "polling aborted before completion".to_string(),
            )),
        }
    }
}

type TaskKey = (String, usize);

/// Occupancy of a block's job slot. The slot is claimed before the
/// provider submission is awaited, so two concurrent submits for the
/// same block can never both reach the provider.
enum TaskSlot {
    /// Claimed; submission still in flight with the provider
    Submitting,
    /// A polling task owns the job
    Polling(JoinHandle<()>),
}

impl TaskSlot {
    fn is_finished(&self) -> bool {
        match self {
            TaskSlot::Submitting => false,
            TaskSlot::Polling(handle) => handle.is_finished(),
        }
    }
}

/// Owns one polling task per in-flight generation job.
pub struct JobPoller {
    store: Arc<ProjectStore>,
    client: Client,
    poll_interval: Duration,
    tasks: Arc<Mutex<HashMap<TaskKey, TaskSlot>>>,
}

impl JobPoller {
    pub fn new(store: Arc<ProjectStore>, poll_interval: Duration) -> Self {
        Self {
            store,
            client: Client::new(),
            poll_interval,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Submit a render request and start polling for its result.
    ///
    /// Submission failure creates no polling task and leaves no state to
    /// clean up. At most one job per block may be in flight; a duplicate
    /// submit fails with `AlreadyInFlight`.
    pub async fn submit(
        &self,
        provider: Arc<dyn VideoGen>,
        project: &str,
        block_index: usize,
        request: SubmitRequest,
    ) -> PipelineResult<JobHandle> {
        let key = (project.to_string(), block_index);
        {
            let mut tasks = self.tasks.lock().expect("poller task map poisoned");
            tasks.retain(|_, slot| !slot.is_finished());
            if tasks.contains_key(&key) {
                return Err(PipelineError::AlreadyInFlight(block_index));
            }
            tasks.insert(key.clone(), TaskSlot::Submitting);
        }

        // The slot is held for the whole submission; any failure releases
        // it so the block can be resubmitted
        match self.start_job(provider, &key, request).await {
            Ok(handle) => Ok(handle),
            Err(e) => {
                self.tasks
                    .lock()
                    .expect("poller task map poisoned")
                    .remove(&key);
                Err(e)
            }
        }
    }

    async fn start_job(
        &self,
        provider: Arc<dyn VideoGen>,
        key: &TaskKey,
        request: SubmitRequest,
    ) -> PipelineResult<JobHandle> {
        let (project, block_index) = (key.0.as_str(), key.1);

        self.store
            .update_block(project, block_index, |block| {
                block.status = BlockStatus::SubmittingJob;
            })
            .await?;

        let provider_id = provider.submit(&request).await?;
        let job = GenerationJob::submitted(
            JobId::from_string(provider_id.as_str()),
            provider.name(),
            block_index,
        );
        info!(
            project,
            block = block_index,
            job = %job.id,
            provider = %job.provider,
            "Submitted generation job"
        );

        self.store
            .update_block(project, block_index, |block| {
                block.generation_job_id = Some(job.id.to_string());
                block.status = BlockStatus::JobPending;
            })
            .await?;

        let (tx, rx) = watch::channel(JobStatus::Pending);
        let job_id = job.id.clone();
        let task = PollTask {
            store: Arc::clone(&self.store),
            client: self.client.clone(),
            provider,
            project: project.to_string(),
            block_index,
            provider_id,
            interval: self.poll_interval,
        };

        let tasks = Arc::clone(&self.tasks);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            task.run(tx).await;
            tasks
                .lock()
                .expect("poller task map poisoned")
                .remove(&task_key);
        });
        self.tasks
            .lock()
            .expect("poller task map poisoned")
            .insert(key.clone(), TaskSlot::Polling(handle));

        Ok(JobHandle {
            job_id,
            block_index,
            completion: rx,
        })
    }

    /// Number of jobs currently in flight.
    pub fn in_flight(&self) -> usize {
        let mut tasks = self.tasks.lock().expect("poller task map poisoned");
        tasks.retain(|_, slot| !slot.is_finished());
        tasks.len()
    }

    /// Abort every outstanding polling task.
    ///
    /// Aborted tasks write nothing; persisted block state stays at its
    /// last completed step, per the no-rollback invariant.
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().expect("poller task map poisoned");
        for ((project, block), slot) in tasks.drain() {
            if let TaskSlot::Polling(handle) = slot {
                handle.abort();
                warn!(project, block, "Aborted polling task at shutdown");
            }
        }
    }
}

impl Drop for JobPoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct PollTask {
    store: Arc<ProjectStore>,
    client: Client,
    provider: Arc<dyn VideoGen>,
    project: String,
    block_index: usize,
    provider_id: sreel_providers::ProviderJobId,
    interval: Duration,
}

impl PollTask {
    async fn run(self, tx: watch::Sender<JobStatus>) {
        let budget = self.provider.poll_budget();

        for attempt in 1..=budget {
            tokio::time::sleep(self.interval).await;

            match self.provider.poll(&self.provider_id).await {
                Ok(JobPoll::Pending) => continue,
                Ok(JobPoll::Ready(url)) => {
                    let status = self.finish_ready(&url).await;
                    self.write_back(status).await;
                    let _ = tx.send(status);
                    return;
                }
                Ok(JobPoll::Failed(reason)) => {
                    error!(
                        project = %self.project,
                        block = self.block_index,
                        job = %self.provider_id,
                        reason,
                        "Generation job failed"
                    );
                    self.write_back(JobStatus::Failed).await;
                    let _ = tx.send(JobStatus::Failed);
                    return;
                }
                Err(e) if e.is_transient() => {
                    // Transient poll failures consume an attempt like any
                    // other pending response
                    warn!(
                        job = %self.provider_id,
                        attempt,
                        error = %e,
                        "Transient poll failure"
                    );
                }
                Err(e) => {
                    error!(job = %self.provider_id, error = %e, "Poll failed");
                    self.write_back(JobStatus::Failed).await;
                    let _ = tx.send(JobStatus::Failed);
                    return;
                }
            }
        }

        warn!(
            project = %self.project,
            block = self.block_index,
            job = %self.provider_id,
            attempts = budget,
            "Generation job exhausted its poll budget"
        );
        self.write_back(JobStatus::TimedOut).await;
        let _ = tx.send(JobStatus::TimedOut);
    }

    /// Download the ready result into the block's video slot.
    async fn finish_ready(&self, url: &str) -> JobStatus {
        let layout = self.store.layout(&self.project);
        let video_ref = layout.video_ref(self.block_index);
        let dest = layout.resolve(&video_ref);

        // Record the hand-off to download before fetching, so a crash
        // mid-download is distinguishable from a stuck render
        if let Err(e) = self
            .store
            .update_block(&self.project, self.block_index, |block| {
                block.status = BlockStatus::JobReady;
            })
            .await
        {
            error!(project = %self.project, block = self.block_index, error = %e, "Persist failed");
            return JobStatus::Failed;
        }

        match fetch_asset(&self.client, url, &dest).await {
            Ok(()) => {
                info!(
                    project = %self.project,
                    block = self.block_index,
                    dest = %dest.display(),
                    "Generation result downloaded"
                );
                JobStatus::Ready
            }
            Err(e) => {
                error!(
                    project = %self.project,
                    block = self.block_index,
                    error = %e,
                    "Result download failed"
                );
                JobStatus::Failed
            }
        }
    }

    /// Persist the job outcome onto the block.
    async fn write_back(&self, status: JobStatus) {
        let layout = self.store.layout(&self.project);
        let video_ref = layout.video_ref(self.block_index);

        let result = self
            .store
            .update_block(&self.project, self.block_index, |block| {
                match status {
                    JobStatus::Ready => {
                        block.video = Some(video_ref.clone());
                        block.status = BlockStatus::Ready;
                    }
                    JobStatus::Failed => block.status = BlockStatus::Failed,
                    JobStatus::TimedOut => block.status = BlockStatus::TimedOut,
                    JobStatus::Pending => {}
                }
                block.generation_job_id = None;
            })
            .await;

        if let Err(e) = result {
            error!(
                project = %self.project,
                block = self.block_index,
                error = %e,
                "Job outcome write-back failed"
            );
        }
    }
}
