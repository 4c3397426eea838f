//! GenerationQueue - tracks in-flight generation jobs and commits their results
//!
//! Each enqueued job gets its own worker task. Workers wait for a semaphore
//! permit, call the `Generator`, store the bytes and post a completion. A single
//! committer task consumes completions in order and writes versions through the
//! registry, so commits never interleave. The permit travels with the
//! completion and is released only after the commit, which keeps the number of
//! `processing` jobs within the configured limit.
//!
//! Jobs hold only the target's ids. The committer re-resolves the target, so a
//! group deleted mid-flight turns into a job error rather than a dangling write.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::generator::Generator;
use super::job::{
    CancelReport, GenerationJob, GenerationRequest, JobKind, JobResult, JobState, JobTarget,
    MAX_CONTEXT_SCREENS,
};
use crate::error::{Result, TripticError};
use crate::registry::AssetGroupRegistry;
use crate::storage::helper::unix_timestamp;
use crate::storage::ids::JobId;
use crate::storage::traits::{BlobStore, StorageTypes};
use crate::storage::types::{AssetVersion, ContentRef, MediaKind, NewVersion, Screen, VersionOrigin};

/// Queue tuning
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Upper bound on simultaneously `processing` jobs
    pub max_concurrent_jobs: usize,
    /// How long an observed terminal job is kept before collection
    pub job_retention: Duration,
    /// How often the background sweeper collects expired jobs
    pub sweep_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            job_retention: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

struct JobRecord {
    job: GenerationJob,
    /// When `poll` first returned the job in a terminal state
    observed_at: Option<i64>,
    cancel: CancellationToken,
}

type JobSlot = Arc<Mutex<JobRecord>>;

/// Worker output handed to the committer
struct Completion {
    job_id: JobId,
    outcome: std::result::Result<NewVersion, String>,
    permit: OwnedSemaphorePermit,
}

struct QueueInner<S: StorageTypes> {
    jobs: RwLock<HashMap<JobId, JobSlot>>,
    registry: Arc<AssetGroupRegistry<S>>,
    generator: Arc<dyn Generator>,
    permits: Arc<Semaphore>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    retention_ms: i64,
    shutdown: CancellationToken,
}

/// Failure text recorded on a job when its target disappears
const TARGET_REMOVED: &str = "target removed";

fn describe(err: TripticError) -> String {
    match err {
        TripticError::AssetGroupNotFound(_) => TARGET_REMOVED.to_string(),
        other => other.to_string(),
    }
}

impl<S: StorageTypes> QueueInner<S> {
    fn slot(&self, id: &JobId) -> Option<JobSlot> {
        self.jobs.read().unwrap().get(id).cloned()
    }

    fn slots(&self) -> Vec<(JobId, JobSlot)> {
        self.jobs
            .read()
            .unwrap()
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect()
    }

    async fn run_job(self: Arc<Self>, slot: JobSlot, id: JobId, cancel: CancellationToken) {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(job = %id, "Job cancelled while queued");
                return;
            }
            permit = self.permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return,
            },
        };

        let job = {
            let mut record = slot.lock().await;
            if !record.job.transition(JobState::Processing, unix_timestamp()) {
                return;
            }
            record.job.clone()
        };
        debug!(job = %id, kind = %job.kind, target = %job.target, "Job processing");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.generator.abort(&id).await;
                debug!(job = %id, "Job cancelled while processing");
                return;
            }
            outcome = self.produce(&job) => outcome,
        };

        if self
            .completion_tx
            .send(Completion {
                job_id: id.clone(),
                outcome,
                permit,
            })
            .is_err()
        {
            warn!(job = %id, "Committer stopped; result dropped");
        }
    }

    /// Current image of the target screen, required by edit and video jobs
    async fn source_image(&self, job: &GenerationJob) -> std::result::Result<(AssetVersion, Vec<u8>), String> {
        let source = self
            .registry
            .current_version(&job.target.group, job.target.screen)
            .await
            .map_err(describe)?;
        if source.media != MediaKind::Image {
            return Err(format!("{} holds a video, not an image", job.target));
        }
        let bytes = self
            .registry
            .content(&source.content_ref)
            .await
            .map_err(describe)?;
        Ok((source, bytes))
    }

    /// Run the generator and store its output; the version is not committed yet
    async fn produce(&self, job: &GenerationJob) -> std::result::Result<NewVersion, String> {
        let target = &job.target;
        let backend = |e: anyhow::Error| format!("{} failed: {:#}", self.generator.name(), e);

        let new = match job.kind {
            JobKind::ImageGenerate => {
                let mut context = Vec::with_capacity(job.context.len());
                for screen in &job.context {
                    match self.registry.current_version(&target.group, *screen).await {
                        Ok(v) if v.media == MediaKind::Image => {
                            context.push(self.registry.content(&v.content_ref).await.map_err(describe)?);
                        }
                        Ok(_) | Err(TripticError::NoCurrentVersion { .. }) => {
                            debug!(job = %job.id, %screen, "Context screen has no image; skipped");
                        }
                        Err(e) => return Err(describe(e)),
                    }
                }
                let bytes = self
                    .generator
                    .generate(&job.prompt, target.screen, &context)
                    .await
                    .map_err(backend)?;
                let content_ref = self.store(&bytes).await?;
                NewVersion::new(content_ref, job.prompt.clone(), VersionOrigin::Generate)
            }
            JobKind::ImageEdit => {
                let (source, bytes) = self.source_image(job).await?;
                let edited = self.generator.edit(&bytes, &job.prompt).await.map_err(backend)?;
                let content_ref = self.store(&edited).await?;
                NewVersion::new(content_ref, job.prompt.clone(), VersionOrigin::Edit)
                    .derived_from(target.screen, source.version_number)
            }
            JobKind::VideoGenerate => {
                let (source, bytes) = self.source_image(job).await?;
                let video = self
                    .generator
                    .generate_video(&bytes, &job.prompt)
                    .await
                    .map_err(backend)?;
                let content_ref = self.store(&video).await?;
                NewVersion::new(content_ref, job.prompt.clone(), VersionOrigin::Video)
                    .with_media(MediaKind::Video)
                    .derived_from(target.screen, source.version_number)
            }
        };
        Ok(new)
    }

    async fn store(&self, bytes: &[u8]) -> std::result::Result<ContentRef, String> {
        if bytes.is_empty() {
            return Err(format!("{} returned no data", self.generator.name()));
        }
        self.registry
            .blobs()
            .store(bytes)
            .await
            .map_err(|e| format!("storing result failed: {:#}", e))
    }

    async fn commit_loop(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<Completion>) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                next = rx.recv() => match next {
                    Some(completion) => self.commit(completion).await,
                    None => break,
                },
            }
        }
        debug!("Committer stopped");
    }

    async fn commit(&self, completion: Completion) {
        let Completion {
            job_id,
            outcome,
            permit,
        } = completion;

        let Some(slot) = self.slot(&job_id) else {
            debug!(job = %job_id, "Completion for collected job ignored");
            return;
        };
        let mut record = slot.lock().await;
        if record.job.state != JobState::Processing {
            warn!(job = %job_id, state = %record.job.state, "Discarding result of job no longer processing");
            return;
        }

        let target = record.job.target.clone();
        match outcome {
            Err(message) => {
                warn!(job = %job_id, target = %target, "Job failed: {}", message);
                record.job.fail(message, unix_timestamp());
            }
            Ok(version) => {
                let content_ref = version.content_ref.clone();
                match self
                    .registry
                    .add_version(&target.group, target.screen, version)
                    .await
                {
                    Ok(number) => {
                        record.job.complete(
                            JobResult {
                                content_ref,
                                version: number,
                            },
                            unix_timestamp(),
                        );
                        info!(job = %job_id, target = %target, version = number, "Job complete");
                    }
                    Err(e) => {
                        let message = describe(e);
                        warn!(job = %job_id, target = %target, "Job commit failed: {}", message);
                        record.job.fail(message, unix_timestamp());
                    }
                }
            }
        }
        drop(record);
        drop(permit);
    }

    fn prune(&self, now: i64) -> usize {
        let mut expired = Vec::new();
        for (id, slot) in self.slots() {
            // busy records are not collectable anyway
            let Ok(record) = slot.try_lock() else {
                continue;
            };
            let finished_long_ago = record
                .job
                .finished_at
                .is_some_and(|f| now - f >= self.retention_ms);
            if record.job.is_terminal() && record.observed_at.is_some() && finished_long_ago {
                expired.push(id);
            }
        }
        if expired.is_empty() {
            return 0;
        }
        let mut jobs = self.jobs.write().unwrap();
        for id in &expired {
            jobs.remove(id);
        }
        debug!(collected = expired.len(), "Pruned finished jobs");
        expired.len()
    }

    async fn sweep_loop(self: Arc<Self>, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.prune(unix_timestamp());
                }
            }
        }
    }
}

/// Job tracker with bounded concurrency and a single commit point
pub struct GenerationQueue<S: StorageTypes> {
    inner: Arc<QueueInner<S>>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl<S: StorageTypes> GenerationQueue<S> {
    /// Start the committer and sweeper. Must be called inside a tokio runtime.
    pub fn new(
        registry: Arc<AssetGroupRegistry<S>>,
        generator: Arc<dyn Generator>,
        config: QueueConfig,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(QueueInner {
            jobs: RwLock::new(HashMap::new()),
            registry,
            generator,
            permits: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            completion_tx,
            retention_ms: config.job_retention.as_millis() as i64,
            shutdown: CancellationToken::new(),
        });

        let committer = tokio::spawn(inner.clone().commit_loop(completion_rx));
        let sweeper = tokio::spawn(
            inner
                .clone()
                .sweep_loop(config.sweep_interval.max(Duration::from_millis(10))),
        );
        info!(
            max_concurrent_jobs = config.max_concurrent_jobs.max(1),
            generator = inner.generator.name(),
            "Generation queue started"
        );

        Self {
            inner,
            tasks: std::sync::Mutex::new(vec![committer, sweeper]),
        }
    }

    /// Validate and register a job, then start its worker. Returns immediately.
    pub async fn enqueue(
        &self,
        kind: JobKind,
        target: JobTarget,
        request: GenerationRequest,
    ) -> Result<JobId> {
        if self.inner.shutdown.is_cancelled() {
            return Err(TripticError::InvalidInput(
                "generation queue is shut down".to_string(),
            ));
        }
        let group = self.inner.registry.get(&target.group).await?;
        let current_prompt = group
            .screen(target.screen)
            .current()
            .map(|v| v.prompt.clone())
            .filter(|p| !p.is_empty());

        let prompt = request.prompt.trim().to_string();
        let prompt = match kind {
            JobKind::ImageGenerate if prompt.is_empty() => current_prompt.ok_or_else(|| {
                TripticError::InvalidInput(format!(
                    "no prompt given and {} has no prompt to reuse",
                    target
                ))
            })?,
            JobKind::ImageEdit if prompt.is_empty() => {
                return Err(TripticError::InvalidInput(
                    "an edit needs a prompt".to_string(),
                ))
            }
            JobKind::VideoGenerate if prompt.is_empty() => current_prompt.unwrap_or_default(),
            _ => prompt,
        };

        check_context(kind, &target, &request.context)?;

        let job = GenerationJob::new(kind, target, prompt, request.context, unix_timestamp());
        let id = job.id.clone();
        let cancel = self.inner.shutdown.child_token();
        info!(job = %id, %kind, target = %job.target, "Enqueued job");

        let slot = Arc::new(Mutex::new(JobRecord {
            job,
            observed_at: None,
            cancel: cancel.clone(),
        }));
        self.inner
            .jobs
            .write()
            .unwrap()
            .insert(id.clone(), slot.clone());
        tokio::spawn(self.inner.clone().run_job(slot, id.clone(), cancel));
        Ok(id)
    }

    /// Snapshot of one job. Returning a terminal job marks it observed.
    pub async fn poll(&self, id: &JobId) -> Result<GenerationJob> {
        let slot = self
            .inner
            .slot(id)
            .ok_or_else(|| TripticError::JobNotFound(id.clone()))?;
        let mut record = slot.lock().await;
        if record.job.is_terminal() && record.observed_at.is_none() {
            record.observed_at = Some(unix_timestamp());
        }
        Ok(record.job.clone())
    }

    /// Poll until the job reaches a terminal state
    pub async fn wait(&self, id: &JobId, every: Duration) -> Result<GenerationJob> {
        loop {
            let job = self.poll(id).await?;
            if job.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(every).await;
        }
    }

    /// Cancel queued or processing jobs. Terminal and unknown ids are reported, not raised.
    pub async fn cancel(&self, ids: &[JobId]) -> CancelReport {
        let mut report = CancelReport::default();
        for id in ids {
            let Some(slot) = self.inner.slot(id) else {
                report.unknown.push(id.clone());
                continue;
            };
            let mut record = slot.lock().await;
            if record.job.transition(JobState::Cancelled, unix_timestamp()) {
                record.cancel.cancel();
                info!(job = %id, "Job cancelled");
                report.cancelled.push(id.clone());
            } else {
                report.already_terminal.push(id.clone());
            }
        }
        report
    }

    /// All tracked jobs, oldest first
    pub async fn list(&self) -> Vec<GenerationJob> {
        let mut jobs = Vec::new();
        for (_, slot) in self.inner.slots() {
            jobs.push(slot.lock().await.job.clone());
        }
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    /// Collect observed terminal jobs past retention; returns how many went
    pub fn prune(&self, now: i64) -> usize {
        self.inner.prune(now)
    }

    /// Number of jobs still tracked
    pub fn len(&self) -> usize {
        self.inner.jobs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel outstanding jobs and stop the background tasks
    pub async fn shutdown(&self) {
        let mut active = Vec::new();
        for (id, slot) in self.inner.slots() {
            if !slot.lock().await.job.is_terminal() {
                active.push(id);
            }
        }
        let report = self.cancel(&active).await;
        self.inner.shutdown.cancel();
        self.inner.permits.close();

        let handles = std::mem::take(&mut *self.tasks.lock().unwrap());
        for handle in handles {
            let _ = handle.await;
        }
        info!(cancelled = report.cancelled.len(), "Generation queue stopped");
    }
}

impl<S: StorageTypes> Drop for GenerationQueue<S> {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

fn check_context(kind: JobKind, target: &JobTarget, context: &[Screen]) -> Result<()> {
    if context.is_empty() {
        return Ok(());
    }
    if kind != JobKind::ImageGenerate {
        return Err(TripticError::InvalidInput(format!(
            "{} jobs do not take context screens",
            kind
        )));
    }
    if context.len() > MAX_CONTEXT_SCREENS {
        return Err(TripticError::InvalidInput(format!(
            "at most {} context screens are allowed",
            MAX_CONTEXT_SCREENS
        )));
    }
    if context.contains(&target.screen) {
        return Err(TripticError::InvalidInput(format!(
            "{} cannot be its own context",
            target.screen
        )));
    }
    if context.len() == 2 && context[0] == context[1] {
        return Err(TripticError::InvalidInput(
            "context screens must be distinct".to_string(),
        ));
    }
    Ok(())
}
