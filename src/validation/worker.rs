//! Fraud Worker
//!
//! Decouples review ingestion from scoring. Producers call `enqueue`, which
//! never blocks: when the bounded queue is full the review is dropped and the
//! drop is logged. A single consumer task pulls reviews in arrival order,
//! scores them and persists the outcome, one job at a time.
//!
//! ```text
//!  enqueue ──try_send──► [ bounded mpsc, cap 100 ] ──recv──► consumer
//!     │ full/closed                                         │ timeout(5s)
//!     ▼                                                     ▼
//!   drop + warn                         evaluate → save result → mark review
//! ```
//!
//! Failures inside a job (timeout, save, mark) are logged and counted, never
//! retried, and never reported to the producer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::database::{StorageError, ValidationStore};
use crate::models::{Review, ReviewStatus, ValidationResult};
use crate::validation::FraudEngine;

/// Component name attached to every log event from the worker
pub const FRAUD_QUEUE_NAME: &str = "fraud-validation-queue";

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(5);

/// How a job writes its outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistMode {
    /// Save the result, then mark the review: two writes. A failed mark
    /// leaves the result without a review pointing at it.
    #[default]
    TwoStep,
    /// One atomic, idempotent `commit_validation` write
    Transactional,
}

impl PersistMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersistMode::TwoStep => "two_step",
            PersistMode::Transactional => "transactional",
        }
    }
}

impl fmt::Display for PersistMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersistMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "two_step" | "two-step" => Ok(PersistMode::TwoStep),
            "transactional" => Ok(PersistMode::Transactional),
            other => Err(format!("Unknown persist mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub queue_capacity: usize,
    /// Deadline for evaluate + persist, measured from when the job is picked up
    pub job_timeout: Duration,
    pub persist_mode: PersistMode,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            job_timeout: DEFAULT_JOB_TIMEOUT,
            persist_mode: PersistMode::default(),
        }
    }
}

/// Running counters for the worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    accepted: AtomicU64,
    dropped: AtomicU64,
    processed: AtomicU64,
    timed_out: AtomicU64,
    save_failures: AtomicU64,
    mark_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatsSnapshot {
    pub accepted: u64,
    pub dropped: u64,
    pub processed: u64,
    pub timed_out: u64,
    pub save_failures: u64,
    pub mark_failures: u64,
}

impl WorkerStatsSnapshot {
    /// Accepted jobs that have finished, successfully or not
    pub fn finished(&self) -> u64 {
        self.processed + self.timed_out + self.save_failures + self.mark_failures
    }
}

impl WorkerStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            save_failures: self.save_failures.load(Ordering::Relaxed),
            mark_failures: self.mark_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("fraud worker already started")]
    AlreadyStarted,

    #[error("fraud worker state lock poisoned")]
    StatePoisoned,
}

#[derive(Debug, Error)]
enum JobError {
    #[error("failed to save validation result: {0}")]
    Save(#[source] StorageError),

    #[error("failed to mark review, result {result_id} left unlinked: {source}")]
    Mark {
        result_id: Uuid,
        #[source]
        source: StorageError,
    },

    #[error("failed to commit validation: {0}")]
    Commit(#[source] StorageError),
}

/// Everything the consumer needs to run one job
struct JobProcessor {
    engine: Arc<FraudEngine>,
    store: Arc<dyn ValidationStore>,
    job_timeout: Duration,
    persist_mode: PersistMode,
    stats: Arc<WorkerStats>,
}

impl JobProcessor {
    async fn handle(&self, review: Review) {
        let review_id = review.id;

        match tokio::time::timeout(self.job_timeout, self.process(&review)).await {
            Ok(Ok(result)) => {
                WorkerStats::bump(&self.stats.processed);
                info!(
                    component = FRAUD_QUEUE_NAME,
                    review_id = %review_id,
                    result_id = %result.id,
                    score = result.score,
                    outcome = %result.outcome,
                    signals = result.signals.len(),
                    "Review validated"
                );
            }
            Ok(Err(e)) => {
                match &e {
                    JobError::Mark { .. } => WorkerStats::bump(&self.stats.mark_failures),
                    JobError::Save(_) | JobError::Commit(_) => {
                        WorkerStats::bump(&self.stats.save_failures)
                    }
                }
                error!(
                    component = FRAUD_QUEUE_NAME,
                    review_id = %review_id,
                    error = %e,
                    "Validation job failed"
                );
            }
            Err(_) => {
                WorkerStats::bump(&self.stats.timed_out);
                warn!(
                    component = FRAUD_QUEUE_NAME,
                    review_id = %review_id,
                    timeout_ms = self.job_timeout.as_millis() as u64,
                    error = "job timed out",
                    "Validation job timed out, abandoning"
                );
            }
        }
    }

    async fn process(&self, review: &Review) -> Result<ValidationResult, JobError> {
        let (result, suspicious) = self.engine.evaluate(review);
        let status = ReviewStatus::from_suspicious(suspicious);

        match self.persist_mode {
            PersistMode::TwoStep => {
                let result_id = self
                    .store
                    .save_validation_result(&result)
                    .await
                    .map_err(JobError::Save)?;
                self.store
                    .mark_review_validated(review.id, result_id, status, suspicious)
                    .await
                    .map_err(|source| JobError::Mark { result_id, source })?;
            }
            PersistMode::Transactional => {
                self.store
                    .commit_validation(&result, status, suspicious)
                    .await
                    .map_err(JobError::Commit)?;
            }
        }

        Ok(result)
    }
}

/// Bounded queue plus its single consumer task.
///
/// Construct once at startup and share by `Arc`; `start` and `shutdown`
/// must be called from within a tokio runtime.
pub struct FraudWorker {
    sender: mpsc::Sender<Review>,
    receiver: Mutex<Option<mpsc::Receiver<Review>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    shutdown: Arc<Notify>,
    processor: Arc<JobProcessor>,
    capacity: usize,
}

impl FraudWorker {
    pub fn new(engine: FraudEngine, store: Arc<dyn ValidationStore>, config: WorkerConfig) -> Self {
        let capacity = config.queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);

        let processor = JobProcessor {
            engine: Arc::new(engine),
            store,
            job_timeout: config.job_timeout,
            persist_mode: config.persist_mode,
            stats: Arc::new(WorkerStats::default()),
        };

        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            handle: Mutex::new(None),
            shutdown: Arc::new(Notify::new()),
            processor: Arc::new(processor),
            capacity,
        }
    }

    /// Queue a review for validation without blocking. Dropped (and logged)
    /// if the queue is full or the worker has shut down.
    pub fn enqueue(&self, review: Review) {
        let review_id = review.id;

        match self.sender.try_send(review) {
            Ok(()) => {
                WorkerStats::bump(&self.processor.stats.accepted);
                debug!(component = FRAUD_QUEUE_NAME, review_id = %review_id, "Review queued");
            }
            Err(TrySendError::Full(_)) => {
                WorkerStats::bump(&self.processor.stats.dropped);
                warn!(
                    component = FRAUD_QUEUE_NAME,
                    review_id = %review_id,
                    capacity = self.capacity,
                    error = "queue full",
                    "Fraud validation queue is full, dropping review"
                );
            }
            Err(TrySendError::Closed(_)) => {
                WorkerStats::bump(&self.processor.stats.dropped);
                warn!(
                    component = FRAUD_QUEUE_NAME,
                    review_id = %review_id,
                    error = "queue closed",
                    "Fraud validation queue is closed, dropping review"
                );
            }
        }
    }

    /// Spawn the consumer loop
    pub fn start(&self) -> Result<(), WorkerError> {
        let receiver = self
            .receiver
            .lock()
            .map_err(|_| WorkerError::StatePoisoned)?
            .take()
            .ok_or(WorkerError::AlreadyStarted)?;

        let handle = tokio::spawn(run_consumer(
            receiver,
            self.processor.clone(),
            self.shutdown.clone(),
        ));

        *self.handle.lock().map_err(|_| WorkerError::StatePoisoned)? = Some(handle);

        info!(
            component = FRAUD_QUEUE_NAME,
            capacity = self.capacity,
            timeout_ms = self.processor.job_timeout.as_millis() as u64,
            persist_mode = %self.processor.persist_mode,
            "Fraud worker started"
        );
        Ok(())
    }

    /// Stop accepting reviews, finish the ones already queued, and wait for
    /// the consumer to exit. If the worker was never started, queued reviews
    /// are discarded.
    pub async fn shutdown(&self) -> Result<WorkerStatsSnapshot, WorkerError> {
        self.shutdown.notify_one();

        let handle = self
            .handle
            .lock()
            .map_err(|_| WorkerError::StatePoisoned)?
            .take();

        match handle {
            Some(handle) => {
                if let Err(e) = handle.await {
                    error!(component = FRAUD_QUEUE_NAME, error = %e, "Fraud worker task ended abnormally");
                }
            }
            None => {
                let receiver = self
                    .receiver
                    .lock()
                    .map_err(|_| WorkerError::StatePoisoned)?
                    .take();
                if let Some(mut receiver) = receiver {
                    receiver.close();
                    let mut discarded = 0u64;
                    while receiver.try_recv().is_ok() {
                        discarded += 1;
                    }
                    if discarded > 0 {
                        warn!(
                            component = FRAUD_QUEUE_NAME,
                            discarded,
                            "Fraud worker shut down before start, queued reviews discarded"
                        );
                    }
                }
            }
        }

        let stats = self.stats();
        info!(
            component = FRAUD_QUEUE_NAME,
            processed = stats.processed,
            dropped = stats.dropped,
            timed_out = stats.timed_out,
            "Fraud worker stopped"
        );
        Ok(stats)
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.processor.stats.snapshot()
    }

    /// Reviews accepted but not yet picked up by the consumer
    pub fn queue_depth(&self) -> usize {
        self.capacity.saturating_sub(self.sender.capacity())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .map(|h| h.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }
}

async fn run_consumer(
    mut receiver: mpsc::Receiver<Review>,
    processor: Arc<JobProcessor>,
    shutdown: Arc<Notify>,
) {
    debug!(component = FRAUD_QUEUE_NAME, "Consumer loop running");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.notified() => {
                receiver.close();
                break;
            }
            next = receiver.recv() => match next {
                Some(review) => processor.handle(review).await,
                // every sender is gone, nothing more can arrive
                None => return,
            }
        }
    }

    let mut drained = 0u64;
    while let Some(review) = receiver.recv().await {
        processor.handle(review).await;
        drained += 1;
    }
    debug!(component = FRAUD_QUEUE_NAME, drained, "Consumer loop drained and stopped");
}
