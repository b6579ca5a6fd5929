use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use nanoid::nanoid;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::TranslationFailure;
use crate::config::WorkerConfig;
use crate::translation::TranslationEngine;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Done(String),
    Failed(String),
}

impl JobStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, JobStatus::Pending)
    }
}

/// A background translation, observable by id until it is pruned.
#[derive(Debug, Clone, Serialize)]
pub struct TranslationJob {
    pub id: String,
    pub source_text: String,
    pub submitted_at: DateTime<Utc>,
    pub status: JobStatus,
}

/// Read side of a submitted job. Dropping it never cancels the job.
#[derive(Debug)]
pub struct JobHandle {
    id: String,
    updates: watch::Receiver<JobStatus>,
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> JobStatus {
        self.updates.borrow().clone()
    }

    /// Resolves once the job leaves `Pending`.
    pub async fn wait(&mut self) -> Result<String, TranslationFailure> {
        let status = self
            .updates
            .wait_for(|status| !status.is_pending())
            .await
            .map_err(|_| TranslationFailure::WorkerGone)?
            .clone();

        match status {
            JobStatus::Done(translation) => Ok(translation),
            JobStatus::Failed(reason) => Err(TranslationFailure::Engine(reason)),
            JobStatus::Pending => Err(TranslationFailure::WorkerGone),
        }
    }
}

struct JobEntry {
    job: TranslationJob,
    finished_at: Option<Instant>,
    updates: watch::Sender<JobStatus>,
}

/// Every job the pool has accepted, pending or finished.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<String, JobEntry>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, JobEntry>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, source_text: &str) -> JobHandle {
        let id = nanoid!();
        let (updates, receiver) = watch::channel(JobStatus::Pending);

        let entry = JobEntry {
            job: TranslationJob {
                id: id.clone(),
                source_text: source_text.to_string(),
                submitted_at: Utc::now(),
                status: JobStatus::Pending,
            },
            finished_at: None,
            updates,
        };
        self.lock().insert(id.clone(), entry);

        JobHandle {
            id,
            updates: receiver,
        }
    }

    fn remove(&self, id: &str) {
        self.lock().remove(id);
    }

    fn complete(&self, id: &str, status: JobStatus) {
        let mut jobs = self.lock();
        let Some(entry) = jobs.get_mut(id) else {
            return;
        };
        entry.job.status = status.clone();
        entry.finished_at = Some(Instant::now());
        entry.updates.send_replace(status);
    }

    /// Snapshot of a job by id, `None` once pruned or never submitted.
    pub fn status(&self, id: &str) -> Option<TranslationJob> {
        self.lock().get(id).map(|entry| entry.job.clone())
    }

    /// A fresh handle on an existing job.
    pub fn subscribe(&self, id: &str) -> Option<JobHandle> {
        self.lock().get(id).map(|entry| JobHandle {
            id: id.to_string(),
            updates: entry.updates.subscribe(),
        })
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending(&self) -> usize {
        self.lock()
            .values()
            .filter(|entry| entry.job.status.is_pending())
            .count()
    }

    /// Drops finished jobs older than `retention`. Pending jobs are kept.
    pub fn prune(&self, retention: Duration) -> usize {
        self.prune_at(Instant::now(), retention)
    }

    pub(crate) fn prune_at(&self, now: Instant, retention: Duration) -> usize {
        let mut jobs = self.lock();
        let before = jobs.len();
        jobs.retain(|_, entry| match entry.finished_at {
            Some(finished_at) => now.saturating_duration_since(finished_at) < retention,
            None => true,
        });
        before - jobs.len()
    }

    fn fail_pending(&self, reason: &str) -> usize {
        let mut jobs = self.lock();
        let now = Instant::now();
        let mut failed = 0;
        for entry in jobs.values_mut() {
            if entry.job.status.is_pending() {
                let status = JobStatus::Failed(reason.to_string());
                entry.job.status = status.clone();
                entry.finished_at = Some(now);
                entry.updates.send_replace(status);
                failed += 1;
            }
        }
        failed
    }
}

struct QueuedJob {
    id: String,
    source_text: String,
}

/// Fixed set of workers draining a bounded translation queue.
///
/// The pool owns its cancellation token, so workers keep running until
/// [`WorkerPool::shutdown`] is called, independent of the server's shutdown signal.
pub struct WorkerPool {
    // Taken at shutdown; `None` means no more jobs are accepted.
    sender: Mutex<Option<mpsc::Sender<QueuedJob>>>,
    registry: JobRegistry,
    tracker: TaskTracker,
    token: CancellationToken,
}

impl WorkerPool {
    pub fn start(config: &WorkerConfig, engine: Arc<dyn TranslationEngine>) -> Self {
        let token = CancellationToken::new();
        let concurrency = config.concurrency.max(1);
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let registry = JobRegistry::new();
        let tracker = TaskTracker::new();

        for worker_id in 0..concurrency {
            tracker.spawn(run_worker(
                worker_id,
                Arc::clone(&receiver),
                Arc::clone(&engine),
                registry.clone(),
                token.clone(),
            ));
        }
        tracker.close();

        info!(
            concurrency,
            queue_capacity = config.queue_capacity.max(1),
            "Translation worker pool started"
        );

        Self {
            sender: Mutex::new(Some(sender)),
            registry,
            tracker,
            token,
        }
    }

    fn sender(&self) -> MutexGuard<'_, Option<mpsc::Sender<QueuedJob>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues a job without waiting for queue space.
    pub fn submit(&self, source_text: &str) -> Result<JobHandle, TranslationFailure> {
        // Held across registration so shutdown cannot slip between the two.
        let guard = self.sender();
        let Some(sender) = guard.as_ref() else {
            return Err(TranslationFailure::WorkerGone);
        };

        let handle = self.registry.register(source_text);
        let queued = QueuedJob {
            id: handle.id().to_string(),
            source_text: source_text.to_string(),
        };

        match sender.try_send(queued) {
            Ok(()) => {
                debug!(job_id = %handle.id(), "Translation job queued");
                Ok(handle)
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.registry.remove(&job.id);
                warn!("Translation queue full, rejecting job");
                Err(TranslationFailure::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                self.registry.remove(&job.id);
                Err(TranslationFailure::WorkerGone)
            }
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Jobs accepted but not yet picked up by a worker.
    pub fn queue_depth(&self) -> usize {
        self.sender()
            .as_ref()
            .map_or(0, |sender| sender.max_capacity() - sender.capacity())
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Stops taking jobs and waits for running ones. Jobs still queued fail.
    pub async fn shutdown(&self) {
        self.token.cancel();
        drop(self.sender().take());
        self.tracker.wait().await;
        let abandoned = self.registry.fail_pending("worker pool shut down");
        if abandoned > 0 {
            warn!(abandoned, "Translation jobs abandoned at shutdown");
        }
        info!("Translation worker pool stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<QueuedJob>>>,
    engine: Arc<dyn TranslationEngine>,
    registry: JobRegistry,
    token: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            job = async { receiver.lock().await.recv().await } => job,
        };

        let Some(job) = next else {
            debug!(worker_id, "Translation worker shutting down");
            break;
        };

        // Not raced against the token: a started job always finishes.
        let started = Instant::now();
        let status = match engine.translate(&job.source_text).await {
            Ok(translation) => JobStatus::Done(translation),
            Err(e) => {
                let failure = TranslationFailure::from(e);
                warn!(worker_id, job_id = %job.id, error = %failure, "Translation job failed");
                JobStatus::Failed(failure.to_string())
            }
        };
        debug!(
            worker_id,
            job_id = %job.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Translation job finished"
        );
        registry.complete(&job.id, status);
    }
}
