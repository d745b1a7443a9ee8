//! End-to-end pipeline behavior against an on-disk store, with counting
//! test doubles standing in for the external providers.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use sreel_models::{BlockMode, BlockStatus, JobStatus};
use sreel_providers::{
    ImageGen, JobPoll, ProviderError, ProviderJobId, ProviderResult, SpeechSynth, SubmitRequest,
    VideoCandidate, VideoGen, VideoSearch, VoiceParams,
};
use sreel_store::ProjectStore;

use sreel_media::plan_composition;
use sreel_pipeline::{BlockOutcome, BlockProcessor, JobPoller, PipelineError, RegenFlags};

const FAKE_WAV: &[u8] = b"RIFFfakewavdata";

struct CountingSynth {
    calls: AtomicUsize,
    /// Sub-clip text that triggers a synthesis failure
    fail_on: Option<String>,
}

impl CountingSynth {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: None,
        }
    }

    fn failing_on(marker: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: Some(marker.to_string()),
        }
    }
}

#[async_trait]
impl SpeechSynth for CountingSynth {
    async fn synthesize(&self, text: &str, _voice: &VoiceParams) -> ProviderResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.fail_on {
            if text.contains(marker.as_str()) {
                return Err(ProviderError::http("tts", 400, "rejected input"));
            }
        }
        Ok(FAKE_WAV.to_vec())
    }
}

struct UnusedImageGen;

#[async_trait]
impl ImageGen for UnusedImageGen {
    async fn generate(&self, _prompt: &str) -> ProviderResult<String> {
        panic!("image generation should not run in this test");
    }
}

struct LocalSearch {
    calls: AtomicUsize,
    fixture: PathBuf,
}

#[async_trait]
impl VideoSearch for LocalSearch {
    async fn search(&self, _query: &str) -> ProviderResult<Vec<VideoCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![VideoCandidate {
            url: self.fixture.to_string_lossy().into_owned(),
            width: 1080,
            height: 1920,
            duration: Some(5.0),
            thumbnail: None,
        }])
    }
}

/// Never resolves; used to pin down timeout behavior.
struct StuckVideoGen {
    budget: u32,
}

#[async_trait]
impl VideoGen for StuckVideoGen {
    fn name(&self) -> &str {
        "stuck"
    }

    async fn submit(&self, _request: &SubmitRequest) -> ProviderResult<ProviderJobId> {
        Ok(ProviderJobId("stuck-1".to_string()))
    }

    async fn poll(&self, _id: &ProviderJobId) -> ProviderResult<JobPoll> {
        Ok(JobPoll::Pending)
    }

    fn poll_budget(&self) -> u32 {
        self.budget
    }
}

/// Dwells on the wire during submission and counts how many submissions
/// actually reach the provider; jobs never resolve afterwards.
struct SlowSubmitVideoGen {
    submits: AtomicUsize,
}

#[async_trait]
impl VideoGen for SlowSubmitVideoGen {
    fn name(&self) -> &str {
        "slow-submit"
    }

    async fn submit(&self, _request: &SubmitRequest) -> ProviderResult<ProviderJobId> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(ProviderJobId(format!("slow-{n}")))
    }

    async fn poll(&self, _id: &ProviderJobId) -> ProviderResult<JobPoll> {
        Ok(JobPoll::Pending)
    }

    fn poll_budget(&self) -> u32 {
        u32::MAX
    }
}

/// Resolves each job after a configured number of polls, recording the
/// order in which jobs became ready. Polls before the gate opens return
/// `Pending` without counting, so the countdown starts simultaneously
/// for every job no matter when the paused clock advanced.
struct ScriptedVideoGen {
    /// prompt -> (job id, polls until ready)
    script: HashMap<String, (String, u32)>,
    gate: AtomicBool,
    polls: Mutex<HashMap<String, u32>>,
    completion_order: Mutex<Vec<String>>,
    fixture: PathBuf,
}

#[async_trait]
impl VideoGen for ScriptedVideoGen {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn submit(&self, request: &SubmitRequest) -> ProviderResult<ProviderJobId> {
        let (id, _) = self
            .script
            .get(&request.prompt)
            .expect("unexpected prompt submitted");
        Ok(ProviderJobId(id.clone()))
    }

    async fn poll(&self, id: &ProviderJobId) -> ProviderResult<JobPoll> {
        if !self.gate.load(Ordering::SeqCst) {
            return Ok(JobPoll::Pending);
        }
        let ready_after = self
            .script
            .values()
            .find(|(job_id, _)| job_id == id.as_str())
            .map(|(_, n)| *n)
            .expect("unknown job polled");

        let mut polls = self.polls.lock().unwrap();
        let count = polls.entry(id.as_str().to_string()).or_insert(0);
        *count += 1;
        if *count >= ready_after {
            self.completion_order
                .lock()
                .unwrap()
                .push(id.as_str().to_string());
            Ok(JobPoll::Ready(self.fixture.to_string_lossy().into_owned()))
        } else {
            Ok(JobPoll::Pending)
        }
    }
}

struct Harness {
    _dir: TempDir,
    store: Arc<ProjectStore>,
    poller: Arc<JobPoller>,
    fixture: PathBuf,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let fixture = dir.path().join("fixture.mp4");
    std::fs::write(&fixture, b"not really an mp4").unwrap();

    let store = Arc::new(ProjectStore::new(dir.path().join("projects")));
    let poller = Arc::new(JobPoller::new(Arc::clone(&store), Duration::from_secs(10)));
    Harness {
        _dir: dir,
        store,
        poller,
        fixture,
    }
}

fn processor(
    h: &Harness,
    speech: Arc<dyn SpeechSynth>,
    video_search: Arc<dyn VideoSearch>,
    video_gen: Arc<dyn VideoGen>,
) -> BlockProcessor {
    BlockProcessor::new(
        Arc::clone(&h.store),
        speech,
        Arc::new(UnusedImageGen),
        video_search,
        video_gen,
        Arc::clone(&h.poller),
        VoiceParams::default(),
    )
}

#[tokio::test]
async fn test_cache_hit_makes_zero_provider_calls() {
    let h = harness();
    h.store.create("demo", "", "hello world").await.unwrap();
    let layout = h.store.layout("demo");

    // Seed both assets as if a previous run completed
    let audio_ref = layout.audio_ref(0, 0);
    let video_ref = layout.video_ref(0);
    std::fs::write(layout.resolve(&audio_ref), FAKE_WAV).unwrap();
    std::fs::write(layout.resolve(&video_ref), b"cached video").unwrap();
    h.store
        .update_block("demo", 0, |b| {
            b.audio = vec![audio_ref.clone()];
            b.video = Some(video_ref.clone());
            b.status = BlockStatus::Ready;
        })
        .await
        .unwrap();

    let synth = Arc::new(CountingSynth::new());
    let search = Arc::new(LocalSearch {
        calls: AtomicUsize::new(0),
        fixture: h.fixture.clone(),
    });
    let proc = processor(
        &h,
        Arc::clone(&synth) as Arc<dyn SpeechSynth>,
        Arc::clone(&search) as Arc<dyn VideoSearch>,
        Arc::new(StuckVideoGen { budget: 1 }),
    );

    let outcome = proc
        .process_block("demo", 0, RegenFlags::none())
        .await
        .unwrap();
    assert!(matches!(outcome, BlockOutcome::Ready));

    assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
    assert_eq!(search.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        std::fs::read(layout.resolve(&audio_ref)).unwrap(),
        FAKE_WAV
    );
    assert_eq!(
        std::fs::read(layout.resolve(&video_ref)).unwrap(),
        b"cached video"
    );
}

#[tokio::test(start_paused = true)]
async fn test_stuck_job_times_out_after_exact_budget() {
    let h = harness();
    h.store.create("demo", "", "one line").await.unwrap();

    let provider = Arc::new(StuckVideoGen { budget: 3 });
    let started = tokio::time::Instant::now();
    let mut handle = h
        .poller
        .submit(
            provider,
            "demo",
            0,
            SubmitRequest::text_to_video("one line"),
        )
        .await
        .unwrap();

    let status = handle.wait().await;
    assert_eq!(status, JobStatus::TimedOut);
    // 3 attempts at a fixed 10s interval, nothing more
    assert_eq!(started.elapsed(), Duration::from_secs(30));

    let project = h.store.load("demo").await.unwrap();
    assert_eq!(project.blocks[0].status, BlockStatus::TimedOut);
    assert!(project.blocks[0].generation_job_id.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_submit_is_rejected_while_in_flight() {
    let h = harness();
    h.store.create("demo", "", "one line").await.unwrap();

    let provider = Arc::new(StuckVideoGen { budget: u32::MAX });
    let _handle = h
        .poller
        .submit(
            Arc::clone(&provider) as Arc<dyn VideoGen>,
            "demo",
            0,
            SubmitRequest::text_to_video("one line"),
        )
        .await
        .unwrap();

    let second = h
        .poller
        .submit(
            provider,
            "demo",
            0,
            SubmitRequest::text_to_video("one line"),
        )
        .await;
    assert!(matches!(second, Err(PipelineError::AlreadyInFlight(0))));

    h.poller.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_submits_reach_provider_once() {
    let h = harness();
    h.store.create("demo", "", "one line").await.unwrap();

    // The block's slot is claimed before the submission is awaited, so
    // racing submits must collapse to a single provider call
    let provider = Arc::new(SlowSubmitVideoGen {
        submits: AtomicUsize::new(0),
    });
    let first = h.poller.submit(
        Arc::clone(&provider) as Arc<dyn VideoGen>,
        "demo",
        0,
        SubmitRequest::text_to_video("one line"),
    );
    let second = h.poller.submit(
        Arc::clone(&provider) as Arc<dyn VideoGen>,
        "demo",
        0,
        SubmitRequest::text_to_video("one line"),
    );
    let (a, b) = tokio::join!(first, second);

    let (accepted, rejected) = match (a, b) {
        (Ok(handle), Err(e)) | (Err(e), Ok(handle)) => (handle, e),
        (Ok(_), Ok(_)) => panic!("both submits were accepted"),
        (Err(a), Err(b)) => panic!("both submits failed: {a}, {b}"),
    };
    assert!(matches!(rejected, PipelineError::AlreadyInFlight(0)));
    assert_eq!(accepted.block_index, 0);
    assert_eq!(provider.submits.load(Ordering::SeqCst), 1);
    assert_eq!(h.poller.in_flight(), 1);

    h.poller.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_rejected_duplicate_leaves_live_job_pending() {
    let h = harness();
    h.store.create("demo", "", "one line").await.unwrap();
    let layout = h.store.layout("demo");

    // Cached audio so the duplicate pass goes straight to the visual step
    let audio_ref = layout.audio_ref(0, 0);
    std::fs::write(layout.resolve(&audio_ref), FAKE_WAV).unwrap();
    h.store
        .update_block("demo", 0, |b| {
            b.audio = vec![audio_ref.clone()];
            b.mode = BlockMode::GenerateVideo;
        })
        .await
        .unwrap();

    let provider = Arc::new(StuckVideoGen { budget: u32::MAX });
    let _handle = h
        .poller
        .submit(
            Arc::clone(&provider) as Arc<dyn VideoGen>,
            "demo",
            0,
            SubmitRequest::text_to_video("one line"),
        )
        .await
        .unwrap();

    let project = h.store.load("demo").await.unwrap();
    assert_eq!(project.blocks[0].status, BlockStatus::JobPending);

    let synth = Arc::new(CountingSynth::new());
    let search = Arc::new(LocalSearch {
        calls: AtomicUsize::new(0),
        fixture: h.fixture.clone(),
    });
    let proc = processor(
        &h,
        synth as Arc<dyn SpeechSynth>,
        search as Arc<dyn VideoSearch>,
        provider as Arc<dyn VideoGen>,
    );

    let result = proc.process_block("demo", 0, RegenFlags::none()).await;
    assert!(matches!(result, Err(PipelineError::AlreadyInFlight(0))));

    // The live job keeps its persisted state; the rejection wrote nothing
    let project = h.store.load("demo").await.unwrap();
    assert_eq!(project.blocks[0].status, BlockStatus::JobPending);
    assert!(project.blocks[0].generation_job_id.is_some());
    assert_eq!(h.poller.in_flight(), 1);

    h.poller.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_completion_composes_in_index_order() {
    let h = harness();
    h.store
        .create("demo", "", "alpha\nbravo\ncharlie")
        .await
        .unwrap();
    let layout = h.store.layout("demo");

    // Jobs resolve in order 2, 0, 1
    let script: HashMap<String, (String, u32)> = [
        ("alpha".to_string(), ("job-0".to_string(), 2)),
        ("bravo".to_string(), ("job-1".to_string(), 3)),
        ("charlie".to_string(), ("job-2".to_string(), 1)),
    ]
    .into_iter()
    .collect();
    let provider = Arc::new(ScriptedVideoGen {
        script,
        gate: AtomicBool::new(false),
        polls: Mutex::new(HashMap::new()),
        completion_order: Mutex::new(Vec::new()),
        fixture: h.fixture.clone(),
    });

    // Seed audio so composition planning accepts the blocks
    for index in 0..3 {
        let audio_ref = layout.audio_ref(index, 0);
        std::fs::write(layout.resolve(&audio_ref), FAKE_WAV).unwrap();
        h.store
            .update_block("demo", index, |b| b.audio = vec![audio_ref.clone()])
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for (index, text) in ["alpha", "bravo", "charlie"].iter().enumerate() {
        let handle = h
            .poller
            .submit(
                Arc::clone(&provider) as Arc<dyn VideoGen>,
                "demo",
                index,
                SubmitRequest::text_to_video(*text),
            )
            .await
            .unwrap();
        handles.push(handle);
    }
    provider.gate.store(true, Ordering::SeqCst);

    for handle in &mut handles {
        assert_eq!(handle.wait().await, JobStatus::Ready);
    }

    let order = provider.completion_order.lock().unwrap().clone();
    assert_eq!(order, vec!["job-2", "job-0", "job-1"]);

    let project = h.store.load("demo").await.unwrap();
    let (plans, skipped) = plan_composition(&project, layout.root()).unwrap();
    let indices: Vec<usize> = plans.iter().map(|p| p.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert!(skipped.is_empty());
}

#[tokio::test]
async fn test_one_failing_block_does_not_abort_the_batch() {
    let h = harness();
    h.store
        .create("demo", "", "one\ntwo\nthree\npoison\nfive")
        .await
        .unwrap();
    let layout = h.store.layout("demo");

    let synth = Arc::new(CountingSynth::failing_on("poison"));
    let search = Arc::new(LocalSearch {
        calls: AtomicUsize::new(0),
        fixture: h.fixture.clone(),
    });
    let proc = processor(
        &h,
        synth as Arc<dyn SpeechSynth>,
        search as Arc<dyn VideoSearch>,
        Arc::new(StuckVideoGen { budget: 1 }),
    );

    let report = proc.process_all("demo", RegenFlags::none()).await.unwrap();
    assert_eq!(report.succeeded, vec![0, 1, 2, 4]);
    assert!(report.pending.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, 3);

    let project = h.store.load("demo").await.unwrap();
    assert_eq!(project.blocks[3].status, BlockStatus::Failed);
    for index in [0, 1, 2, 4] {
        assert_eq!(project.blocks[index].status, BlockStatus::Ready);
    }

    // The failed block drops out of composition, the rest still assemble
    let (plans, skipped) = plan_composition(&project, layout.root()).unwrap();
    assert_eq!(plans.len(), 4);
    assert_eq!(skipped, vec![3]);
}

#[tokio::test]
async fn test_regen_audio_resynthesizes() {
    let h = harness();
    h.store.create("demo", "", "hello world").await.unwrap();
    let layout = h.store.layout("demo");

    let audio_ref = layout.audio_ref(0, 0);
    let video_ref = layout.video_ref(0);
    std::fs::write(layout.resolve(&audio_ref), b"stale bytes").unwrap();
    std::fs::write(layout.resolve(&video_ref), b"cached video").unwrap();
    h.store
        .update_block("demo", 0, |b| {
            b.audio = vec![audio_ref.clone()];
            b.video = Some(video_ref.clone());
            b.status = BlockStatus::Ready;
        })
        .await
        .unwrap();

    let synth = Arc::new(CountingSynth::new());
    let search = Arc::new(LocalSearch {
        calls: AtomicUsize::new(0),
        fixture: h.fixture.clone(),
    });
    let proc = processor(
        &h,
        Arc::clone(&synth) as Arc<dyn SpeechSynth>,
        search as Arc<dyn VideoSearch>,
        Arc::new(StuckVideoGen { budget: 1 }),
    );

    proc.process_block(
        "demo",
        0,
        RegenFlags {
            audio: true,
            visual: false,
        },
    )
    .await
    .unwrap();

    assert_eq!(synth.calls.load(Ordering::SeqCst), 1);
    assert_eq!(std::fs::read(layout.resolve(&audio_ref)).unwrap(), FAKE_WAV);
    // The visual was not invalidated
    assert_eq!(
        std::fs::read(layout.resolve(&video_ref)).unwrap(),
        b"cached video"
    );
}
