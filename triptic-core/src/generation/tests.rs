//! Queue behaviour against the in-memory stores

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use super::*;
use crate::display::DisplayContext;
use crate::error::TripticError;
use crate::imaging;
use crate::registry::AssetGroupRegistry;
use crate::storage::ids::{AssetGroupId, JobId};
use crate::storage::implementations::memory::{MemoryStorage, MemoryStores};
use crate::storage::traits::Stores;
use crate::storage::types::{ContentRef, MediaKind, NewVersion, Screen, VersionOrigin};

/// Generator that records how it is called
#[derive(Default)]
struct ScriptedGenerator {
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    aborted: AtomicUsize,
    last_context: Mutex<Option<usize>>,
}

impl ScriptedGenerator {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    async fn work(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, _screen: Screen, context: &[Vec<u8>]) -> Result<Vec<u8>> {
        *self.last_context.lock().unwrap() = Some(context.len());
        self.work().await;
        if prompt == "fail" {
            anyhow::bail!("backend refused prompt");
        }
        imaging::solid_png(2, 2, [prompt.len() as u8, 0, 0])
    }

    async fn edit(&self, image: &[u8], _prompt: &str) -> Result<Vec<u8>> {
        self.work().await;
        imaging::invert(image)
    }

    async fn generate_video(&self, image: &[u8], _prompt: &str) -> Result<Vec<u8>> {
        self.work().await;
        let mut out = b"VIDEO".to_vec();
        out.extend_from_slice(&image[..image.len().min(8)]);
        Ok(out)
    }

    async fn abort(&self, _job: &JobId) {
        self.aborted.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    registry: Arc<AssetGroupRegistry<MemoryStorage>>,
    queue: GenerationQueue<MemoryStorage>,
    generator: Arc<ScriptedGenerator>,
}

const TICK: Duration = Duration::from_millis(5);

async fn harness(generator: ScriptedGenerator, config: QueueConfig) -> Harness {
    let stores = MemoryStores::new();
    let display = Arc::new(DisplayContext::from_stores(&stores, 600).await.unwrap());
    let registry = Arc::new(
        AssetGroupRegistry::load(stores.group(), stores.blob(), display)
            .await
            .unwrap(),
    );
    let generator = Arc::new(generator);
    let queue = GenerationQueue::new(registry.clone(), generator.clone(), config);
    Harness {
        registry,
        queue,
        generator,
    }
}

fn gid(s: &str) -> AssetGroupId {
    AssetGroupId::from_string(s)
}

fn target(group: &str, screen: Screen) -> JobTarget {
    JobTarget::new(gid(group), screen)
}

async fn wait_for_state(queue: &GenerationQueue<MemoryStorage>, id: &JobId, state: JobState) {
    for _ in 0..400 {
        if queue.poll(id).await.unwrap().state == state {
            return;
        }
        tokio::time::sleep(TICK).await;
    }
    panic!("job {} never reached {}", id, state);
}

#[tokio::test]
async fn test_generate_commits_version() {
    let h = harness(ScriptedGenerator::default(), QueueConfig::default()).await;
    h.registry.create(gid("g")).await.unwrap();

    let id = h
        .queue
        .enqueue(
            JobKind::ImageGenerate,
            target("g", Screen::Left),
            GenerationRequest::new("a lighthouse"),
        )
        .await
        .unwrap();
    let job = h.queue.wait(&id, TICK).await.unwrap();

    assert_eq!(job.state, JobState::Complete);
    let result = job.result.expect("complete job has a result");
    assert_eq!(result.version, 1);
    let current = h.registry.current_version(&gid("g"), Screen::Left).await.unwrap();
    assert_eq!(current.content_ref, result.content_ref);
    assert_eq!(current.prompt, "a lighthouse");
    assert_eq!(current.origin, VersionOrigin::Generate);
}

#[tokio::test]
async fn test_prompt_fallback() {
    let h = harness(ScriptedGenerator::default(), QueueConfig::default()).await;
    h.registry.create(gid("g")).await.unwrap();

    let err = h
        .queue
        .enqueue(JobKind::ImageGenerate, target("g", Screen::Left), GenerationRequest::new("  "))
        .await
        .unwrap_err();
    assert!(matches!(err, TripticError::InvalidInput(_)));

    h.registry
        .add_version(
            &gid("g"),
            Screen::Left,
            NewVersion::new(ContentRef::from_data(b"x"), "misty hills", VersionOrigin::Upload),
        )
        .await
        .unwrap();
    let id = h
        .queue
        .enqueue(JobKind::ImageGenerate, target("g", Screen::Left), GenerationRequest::default())
        .await
        .unwrap();
    let job = h.queue.wait(&id, TICK).await.unwrap();
    assert_eq!(job.prompt, "misty hills");
    assert_eq!(job.state, JobState::Complete);
}

#[tokio::test]
async fn test_enqueue_validation() {
    let h = harness(ScriptedGenerator::default(), QueueConfig::default()).await;
    assert!(matches!(
        h.queue
            .enqueue(JobKind::ImageGenerate, target("missing", Screen::Left), GenerationRequest::new("x"))
            .await,
        Err(TripticError::AssetGroupNotFound(_))
    ));

    h.registry.create(gid("g")).await.unwrap();
    let own_context = GenerationRequest::new("x").with_context([Screen::Left]);
    assert!(h
        .queue
        .enqueue(JobKind::ImageGenerate, target("g", Screen::Left), own_context)
        .await
        .is_err());

    let edit_context = GenerationRequest::new("x").with_context([Screen::Right]);
    assert!(h
        .queue
        .enqueue(JobKind::ImageEdit, target("g", Screen::Left), edit_context)
        .await
        .is_err());

    assert!(h
        .queue
        .enqueue(JobKind::ImageEdit, target("g", Screen::Left), GenerationRequest::default())
        .await
        .is_err());
    assert!(h.queue.is_empty());
}

#[tokio::test]
async fn test_context_screens_reach_generator() {
    let h = harness(ScriptedGenerator::default(), QueueConfig::default()).await;
    h.registry.create(gid("g")).await.unwrap();
    let png = imaging::solid_png(2, 2, [9, 9, 9]).unwrap();
    h.registry
        .upload(&gid("g"), Screen::Left, &png, MediaKind::Image)
        .await
        .unwrap();

    // right has no version yet and is skipped
    let request = GenerationRequest::new("center piece").with_context([Screen::Left, Screen::Right]);
    let id = h
        .queue
        .enqueue(JobKind::ImageGenerate, target("g", Screen::Center), request)
        .await
        .unwrap();
    h.queue.wait(&id, TICK).await.unwrap();
    assert_eq!(*h.generator.last_context.lock().unwrap(), Some(1));
}

#[tokio::test]
async fn test_failure_leaves_current_untouched() {
    let h = harness(ScriptedGenerator::default(), QueueConfig::default()).await;
    h.registry.create(gid("g")).await.unwrap();
    h.registry
        .add_version(
            &gid("g"),
            Screen::Right,
            NewVersion::new(ContentRef::from_data(b"keep"), "keep", VersionOrigin::Upload),
        )
        .await
        .unwrap();

    let id = h
        .queue
        .enqueue(JobKind::ImageGenerate, target("g", Screen::Right), GenerationRequest::new("fail"))
        .await
        .unwrap();
    let job = h.queue.wait(&id, TICK).await.unwrap();

    assert_eq!(job.state, JobState::Error);
    assert!(job.error_message.unwrap().contains("backend refused prompt"));
    assert!(job.result.is_none());
    let current = h.registry.current_version(&gid("g"), Screen::Right).await.unwrap();
    assert_eq!(current.prompt, "keep");
}

#[tokio::test]
async fn test_edit_and_video_need_an_image() {
    let h = harness(ScriptedGenerator::default(), QueueConfig::default()).await;
    h.registry.create(gid("g")).await.unwrap();

    let id = h
        .queue
        .enqueue(JobKind::ImageEdit, target("g", Screen::Left), GenerationRequest::new("add snow"))
        .await
        .unwrap();
    let job = h.queue.wait(&id, TICK).await.unwrap();
    assert_eq!(job.state, JobState::Error);

    let png = imaging::solid_png(2, 2, [1, 1, 1]).unwrap();
    h.registry
        .upload(&gid("g"), Screen::Left, &png, MediaKind::Image)
        .await
        .unwrap();

    let id = h
        .queue
        .enqueue(JobKind::ImageEdit, target("g", Screen::Left), GenerationRequest::new("add snow"))
        .await
        .unwrap();
    let job = h.queue.wait(&id, TICK).await.unwrap();
    assert_eq!(job.state, JobState::Complete);

    let id = h
        .queue
        .enqueue(JobKind::VideoGenerate, target("g", Screen::Left), GenerationRequest::default())
        .await
        .unwrap();
    let job = h.queue.wait(&id, TICK).await.unwrap();
    assert_eq!(job.state, JobState::Complete);
    let video = h.registry.current_version(&gid("g"), Screen::Left).await.unwrap();
    assert_eq!(video.media, MediaKind::Video);
    assert_eq!(video.prompt, "add snow");
    assert_eq!(video.derived_from.map(|d| d.version), Some(2));
}

#[tokio::test]
async fn test_cancel_processing_job_discards_result() {
    let generator = ScriptedGenerator::with_delay(Duration::from_millis(300));
    let h = harness(generator, QueueConfig::default()).await;
    h.registry.create(gid("g")).await.unwrap();

    let id = h
        .queue
        .enqueue(JobKind::ImageGenerate, target("g", Screen::Left), GenerationRequest::new("slow"))
        .await
        .unwrap();
    wait_for_state(&h.queue, &id, JobState::Processing).await;

    let report = h.queue.cancel(&[id.clone()]).await;
    assert_eq!(report.cancelled, vec![id.clone()]);

    for _ in 0..100 {
        if h.generator.aborted.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(TICK).await;
    }
    assert_eq!(h.generator.aborted.load(Ordering::SeqCst), 1);
    tokio::time::sleep(Duration::from_millis(400)).await;

    let job = h.queue.poll(&id).await.unwrap();
    assert_eq!(job.state, JobState::Cancelled);
    assert!(h.registry.get(&gid("g")).await.unwrap().screen(Screen::Left).is_empty());
}

#[tokio::test]
async fn test_cancel_queued_and_terminal() {
    let generator = ScriptedGenerator::with_delay(Duration::from_millis(200));
    let config = QueueConfig {
        max_concurrent_jobs: 1,
        ..Default::default()
    };
    let h = harness(generator, config).await;
    h.registry.create(gid("g")).await.unwrap();

    let first = h
        .queue
        .enqueue(JobKind::ImageGenerate, target("g", Screen::Left), GenerationRequest::new("one"))
        .await
        .unwrap();
    wait_for_state(&h.queue, &first, JobState::Processing).await;
    let second = h
        .queue
        .enqueue(JobKind::ImageGenerate, target("g", Screen::Left), GenerationRequest::new("two"))
        .await
        .unwrap();
    assert_eq!(h.queue.poll(&second).await.unwrap().state, JobState::Queued);

    let stray = JobId::new();
    let report = h.queue.cancel(&[second.clone(), stray.clone()]).await;
    assert_eq!(report.cancelled, vec![second.clone()]);
    assert_eq!(report.unknown, vec![stray]);

    let done = h.queue.wait(&first, TICK).await.unwrap();
    assert_eq!(done.state, JobState::Complete);

    // cancelling a finished job changes nothing
    let report = h.queue.cancel(&[first.clone()]).await;
    assert_eq!(report.already_terminal, vec![first.clone()]);
    let again = h.queue.poll(&first).await.unwrap();
    assert_eq!(again.state, JobState::Complete);
    assert_eq!(again.result, done.result);

    let group = h.registry.get(&gid("g")).await.unwrap();
    assert_eq!(group.screen(Screen::Left).len(), 1);
}

#[tokio::test]
async fn test_target_removed_mid_flight() {
    let generator = ScriptedGenerator::with_delay(Duration::from_millis(100));
    let h = harness(generator, QueueConfig::default()).await;
    h.registry.create(gid("doomed")).await.unwrap();

    let id = h
        .queue
        .enqueue(JobKind::ImageGenerate, target("doomed", Screen::Center), GenerationRequest::new("x"))
        .await
        .unwrap();
    wait_for_state(&h.queue, &id, JobState::Processing).await;
    h.registry.delete(&gid("doomed")).await.unwrap();

    let job = h.queue.wait(&id, TICK).await.unwrap();
    assert_eq!(job.state, JobState::Error);
    assert_eq!(job.error_message.as_deref(), Some("target removed"));
    assert!(!h.registry.exists(&gid("doomed")));
}

#[tokio::test]
async fn test_concurrency_limit() {
    let generator = ScriptedGenerator::with_delay(Duration::from_millis(40));
    let config = QueueConfig {
        max_concurrent_jobs: 2,
        ..Default::default()
    };
    let h = harness(generator, config).await;
    h.registry.create(gid("g")).await.unwrap();

    let mut ids = Vec::new();
    for i in 0..6 {
        let screen = Screen::ALL[i % 3];
        ids.push(
            h.queue
                .enqueue(JobKind::ImageGenerate, target("g", screen), GenerationRequest::new(format!("p{}", i)))
                .await
                .unwrap(),
        );
    }
    for id in &ids {
        assert_eq!(h.queue.wait(id, TICK).await.unwrap().state, JobState::Complete);
    }
    assert!(h.generator.max_in_flight.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_last_commit_wins() {
    let h = harness(ScriptedGenerator::default(), QueueConfig::default()).await;
    h.registry.create(gid("g")).await.unwrap();

    let a = h
        .queue
        .enqueue(JobKind::ImageGenerate, target("g", Screen::Left), GenerationRequest::new("a"))
        .await
        .unwrap();
    let b = h
        .queue
        .enqueue(JobKind::ImageGenerate, target("g", Screen::Left), GenerationRequest::new("bb"))
        .await
        .unwrap();
    let va = h.queue.wait(&a, TICK).await.unwrap().result.unwrap().version;
    let vb = h.queue.wait(&b, TICK).await.unwrap().result.unwrap().version;

    assert_ne!(va, vb);
    let current = h.registry.current_version(&gid("g"), Screen::Left).await.unwrap();
    assert_eq!(current.version_number, va.max(vb));
}

#[tokio::test]
async fn test_prune_needs_observation_and_age() {
    let config = QueueConfig {
        job_retention: Duration::ZERO,
        sweep_interval: Duration::from_secs(3600),
        ..Default::default()
    };
    let h = harness(ScriptedGenerator::default(), config).await;
    h.registry.create(gid("g")).await.unwrap();

    let id = h
        .queue
        .enqueue(JobKind::ImageGenerate, target("g", Screen::Left), GenerationRequest::new("x"))
        .await
        .unwrap();
    for _ in 0..400 {
        if h.queue.list().await.iter().all(|j| j.is_terminal()) {
            break;
        }
        tokio::time::sleep(TICK).await;
    }

    let far_future = i64::MAX / 2;
    assert_eq!(h.queue.prune(far_future), 0, "unobserved jobs are kept");

    h.queue.poll(&id).await.unwrap();
    assert_eq!(h.queue.prune(far_future), 1);
    assert!(matches!(
        h.queue.poll(&id).await,
        Err(TripticError::JobNotFound(_))
    ));
}

#[tokio::test]
async fn test_shutdown_cancels_outstanding() {
    let generator = ScriptedGenerator::with_delay(Duration::from_secs(5));
    let h = harness(generator, QueueConfig::default()).await;
    h.registry.create(gid("g")).await.unwrap();

    let id = h
        .queue
        .enqueue(JobKind::ImageGenerate, target("g", Screen::Left), GenerationRequest::new("x"))
        .await
        .unwrap();
    h.queue.shutdown().await;

    assert_eq!(h.queue.poll(&id).await.unwrap().state, JobState::Cancelled);
    assert!(h
        .queue
        .enqueue(JobKind::ImageGenerate, target("g", Screen::Left), GenerationRequest::new("y"))
        .await
        .is_err());
}
