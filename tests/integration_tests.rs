//! Integration tests for the review validator
//!
//! These tests drive the public API end to end: rule scoring across every
//! pass/fail combination, the bounded queue, job timeouts, persistence
//! failure handling and shutdown.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use crowdreview_validator::{
    FraudEngine, FraudWorker, InMemoryValidationStore, Outcome, PersistMode, Review, ReviewStatus,
    StorageError, SuspiciousReview, ValidationInsights, ValidationResult, ValidationStore,
    WorkerConfig,
};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use uuid::Uuid;

// ============================================================================
// Test Helpers
// ============================================================================

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn long_text() -> String {
    vec!["solid"; 25].join(" ")
}

/// A review that passes every rule
fn clean_review() -> Review {
    Review::new(4, "Good service", long_text())
        .with_ip("203.0.113.7")
        .with_geo("NL")
        .with_created_at(Utc::now() - Duration::days(3))
}

/// A review that fails every rule
fn spam_review() -> Review {
    Review::new(5, "!!!", "free money, click here")
}

fn worker_config(capacity: usize, persist_mode: PersistMode) -> WorkerConfig {
    WorkerConfig {
        queue_capacity: capacity,
        job_timeout: StdDuration::from_secs(5),
        persist_mode,
    }
}

/// In-memory store with injectable latency and failures
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryValidationStore,
    slow_review: Option<Uuid>,
    delay: StdDuration,
    fail_save: bool,
    fail_mark: bool,
}

impl FlakyStore {
    async fn stall(&self, review_id: Uuid) {
        if self.slow_review == Some(review_id) {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl ValidationStore for FlakyStore {
    async fn save_validation_result(&self, result: &ValidationResult) -> Result<Uuid, StorageError> {
        self.stall(result.review_id).await;
        if self.fail_save {
            return Err(StorageError::Unavailable("save refused".to_string()));
        }
        self.inner.save_validation_result(result).await
    }

    async fn mark_review_validated(
        &self,
        review_id: Uuid,
        validation_result_id: Uuid,
        status: ReviewStatus,
        suspicious: bool,
    ) -> Result<(), StorageError> {
        if self.fail_mark {
            return Err(StorageError::Unavailable("mark refused".to_string()));
        }
        self.inner
            .mark_review_validated(review_id, validation_result_id, status, suspicious)
            .await
    }

    async fn commit_validation(
        &self,
        result: &ValidationResult,
        status: ReviewStatus,
        suspicious: bool,
    ) -> Result<Uuid, StorageError> {
        self.stall(result.review_id).await;
        self.inner.commit_validation(result, status, suspicious).await
    }

    async fn get_validation_result(
        &self,
        review_id: Uuid,
    ) -> Result<Option<ValidationResult>, StorageError> {
        self.inner.get_validation_result(review_id).await
    }

    async fn list_suspicious(&self) -> Result<Vec<SuspiciousReview>, StorageError> {
        self.inner.list_suspicious().await
    }

    async fn insights(&self) -> Result<ValidationInsights, StorageError> {
        self.inner.insights().await
    }
}

// ============================================================================
// Scoring
// ============================================================================

mod scoring {
    use super::*;

    const PASS: [f64; 6] = [10.0, 5.0, 8.0, 4.0, 6.0, 5.0];
    const FAIL: [f64; 6] = [-15.0, -10.0, -25.0, -5.0, -12.0, -10.0];

    /// Bit i set means rule i (in standard order) should pass
    fn review_for(mask: u8, now: DateTime<Utc>) -> Review {
        let pass = |i: u8| mask & (1 << i) != 0;

        let mut content = if pass(0) { long_text() } else { "too short".to_string() };
        if !pass(2) {
            content.push_str(" scam");
        }

        Review::new(if pass(1) { 3 } else { 1 }, "title", content)
            .with_geo(if pass(3) { "DE" } else { "unknown" })
            .with_created_at(if pass(4) {
                now - Duration::hours(48)
            } else {
                now - Duration::minutes(30)
            })
            .with_ip(if pass(5) { "198.51.100.1" } else { "" })
    }

    #[test]
    fn test_every_rule_combination() {
        let engine = FraudEngine::new();
        let now = fixed_now();

        for mask in 0u8..64 {
            let review = review_for(mask, now);
            let (result, suspicious) = engine.evaluate_at(&review, now);

            let raw: f64 = 50.0
                + (0..6)
                    .map(|i| if mask & (1 << i) != 0 { PASS[i] } else { FAIL[i] })
                    .sum::<f64>();
            let expected = raw.clamp(0.0, 100.0);
            let failed = 6 - mask.count_ones() as usize;

            assert_eq!(result.score, expected, "mask {:06b}", mask);
            assert!((0.0..=100.0).contains(&result.score));
            assert_eq!(result.checks.len(), 6);
            assert_eq!(result.signals.len(), failed, "mask {:06b}", mask);
            assert!(result.signals.iter().all(|s| s.validation_result_id == result.id));

            let outcome = if expected < 40.0 {
                Outcome::Rejected
            } else if expected < 55.0 {
                Outcome::Flagged
            } else {
                Outcome::Approved
            };
            assert_eq!(result.outcome, outcome, "mask {:06b}", mask);
            assert_eq!(suspicious, outcome != Outcome::Approved);
        }
    }

    #[test]
    fn test_only_freshness_fails() {
        let now = fixed_now();
        let review = review_for(0b101111, now);
        let (result, suspicious) = FraudEngine::new().evaluate_at(&review, now);

        assert_eq!(result.score, 70.0);
        assert_eq!(result.outcome, Outcome::Approved);
        assert!(!suspicious);
        assert_eq!(result.failed_rules(), vec!["freshness"]);
    }

    #[test]
    fn test_spam_is_rejected_at_floor() {
        let (result, suspicious) = FraudEngine::new().evaluate(&spam_review());
        assert_eq!(result.score, 0.0);
        assert_eq!(result.outcome, Outcome::Rejected);
        assert!(suspicious);
        assert_eq!(result.signals.len(), 6);
    }
}

// ============================================================================
// Queue behaviour
// ============================================================================

mod queue {
    use super::*;

    #[tokio::test]
    async fn test_drop_on_full_and_fifo() {
        let store = Arc::new(InMemoryValidationStore::new());
        let worker = FraudWorker::new(
            FraudEngine::new(),
            store.clone(),
            worker_config(100, PersistMode::TwoStep),
        );

        let mut ids = Vec::new();
        for _ in 0..101 {
            let review = clean_review();
            store.register_review(&review).await;
            ids.push(review.id);
            worker.enqueue(review);
        }

        assert_eq!(worker.queue_depth(), 100);
        assert_eq!(worker.stats().dropped, 1);

        worker.start().unwrap();
        let stats = worker.shutdown().await.unwrap();

        assert_eq!(stats.accepted, 100);
        assert_eq!(stats.processed, 100);
        assert_eq!(store.saved_review_ids().await, ids[..100].to_vec());
        assert!(store.get_validation_result(ids[100]).await.unwrap().is_none());
        assert_eq!(
            store.review_state(ids[100]).await.unwrap().status,
            ReviewStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_concurrent_producers() {
        let store = Arc::new(InMemoryValidationStore::new());
        let worker = Arc::new(FraudWorker::new(
            FraudEngine::new(),
            store.clone(),
            worker_config(100, PersistMode::TwoStep),
        ));
        worker.start().unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let worker = worker.clone();
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..20 {
                    let review = clean_review();
                    store.register_review(&review).await;
                    worker.enqueue(review);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stats = worker.shutdown().await.unwrap();
        assert_eq!(stats.accepted, 80);
        assert_eq!(stats.processed, 80);
        assert_eq!(store.result_count().await, 80);
    }

    #[tokio::test]
    async fn test_outcomes_written_back() {
        let store = Arc::new(InMemoryValidationStore::new());
        let worker = FraudWorker::new(
            FraudEngine::new(),
            store.clone(),
            worker_config(10, PersistMode::TwoStep),
        );
        worker.start().unwrap();

        let clean = clean_review();
        let spam = spam_review();
        for review in [&clean, &spam] {
            store.register_review(review).await;
            worker.enqueue(review.clone());
        }
        worker.shutdown().await.unwrap();

        let clean_state = store.review_state(clean.id).await.unwrap();
        assert_eq!(clean_state.status, ReviewStatus::Approved);
        assert!(!clean_state.suspicious);

        // rejected outcomes are surfaced as flagged on the review itself
        let spam_state = store.review_state(spam.id).await.unwrap();
        assert_eq!(spam_state.status, ReviewStatus::Flagged);
        assert!(spam_state.suspicious);
        let spam_result = store.get_validation_result(spam.id).await.unwrap().unwrap();
        assert_eq!(spam_result.outcome, Outcome::Rejected);
        assert_eq!(spam_state.validation_result_id, Some(spam_result.id));

        let suspicious = store.list_suspicious().await.unwrap();
        assert_eq!(suspicious.len(), 1);
        assert_eq!(suspicious[0].review_id, spam.id);
    }
}

// ============================================================================
// Failure handling
// ============================================================================

mod failures {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_slow_job_times_out_and_worker_continues() {
        let slow = clean_review();
        let next = clean_review();

        let store = Arc::new(FlakyStore {
            slow_review: Some(slow.id),
            delay: StdDuration::from_secs(30),
            ..Default::default()
        });
        for review in [&slow, &next] {
            store.inner.register_review(review).await;
        }

        let worker = FraudWorker::new(
            FraudEngine::new(),
            store.clone(),
            worker_config(10, PersistMode::TwoStep),
        );
        worker.enqueue(slow.clone());
        worker.enqueue(next.clone());
        worker.start().unwrap();

        let stats = worker.shutdown().await.unwrap();
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.processed, 1);

        assert!(store.inner.get_validation_result(slow.id).await.unwrap().is_none());
        assert_eq!(
            store.inner.review_state(slow.id).await.unwrap().status,
            ReviewStatus::Pending
        );
        assert_eq!(
            store.inner.review_state(next.id).await.unwrap().status,
            ReviewStatus::Approved
        );
    }

    #[tokio::test]
    async fn test_save_failure_skips_mark() {
        let store = Arc::new(FlakyStore {
            fail_save: true,
            ..Default::default()
        });
        let review = clean_review();
        store.inner.register_review(&review).await;

        let worker = FraudWorker::new(
            FraudEngine::new(),
            store.clone(),
            worker_config(10, PersistMode::TwoStep),
        );
        worker.start().unwrap();
        worker.enqueue(review.clone());
        let stats = worker.shutdown().await.unwrap();

        assert_eq!(stats.save_failures, 1);
        assert_eq!(stats.processed, 0);
        assert_eq!(store.inner.result_count().await, 0);
        assert_eq!(
            store.inner.review_state(review.id).await.unwrap().status,
            ReviewStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_mark_failure_leaves_unlinked_result() {
        let store = Arc::new(FlakyStore {
            fail_mark: true,
            ..Default::default()
        });
        let review = spam_review();
        store.inner.register_review(&review).await;

        let worker = FraudWorker::new(
            FraudEngine::new(),
            store.clone(),
            worker_config(10, PersistMode::TwoStep),
        );
        worker.start().unwrap();
        worker.enqueue(review.clone());
        let stats = worker.shutdown().await.unwrap();

        assert_eq!(stats.mark_failures, 1);
        let saved = store.inner.get_validation_result(review.id).await.unwrap().unwrap();
        assert_eq!(store.inner.orphaned_results().await, vec![saved.id]);

        let state = store.inner.review_state(review.id).await.unwrap();
        assert_eq!(state.status, ReviewStatus::Pending);
        assert_eq!(state.validation_result_id, None);
    }

    #[tokio::test]
    async fn test_transactional_mode_leaves_nothing_behind() {
        let store = Arc::new(InMemoryValidationStore::new());
        let worker = FraudWorker::new(
            FraudEngine::new(),
            store.clone(),
            worker_config(10, PersistMode::Transactional),
        );
        worker.start().unwrap();

        // never registered, so the review row update would fail
        let unknown = clean_review();
        let known = spam_review();
        store.register_review(&known).await;

        worker.enqueue(unknown.clone());
        worker.enqueue(known.clone());
        let stats = worker.shutdown().await.unwrap();

        assert_eq!(stats.save_failures, 1);
        assert_eq!(stats.processed, 1);
        assert_eq!(store.result_count().await, 1);
        assert!(store.orphaned_results().await.is_empty());
        assert!(store.get_validation_result(unknown.id).await.unwrap().is_none());
        assert_eq!(
            store.review_state(known.id).await.unwrap().status,
            ReviewStatus::Flagged
        );
    }

    #[tokio::test]
    async fn test_two_step_unknown_review_orphans_result() {
        let store = Arc::new(InMemoryValidationStore::new());
        let worker = FraudWorker::new(
            FraudEngine::new(),
            store.clone(),
            worker_config(10, PersistMode::TwoStep),
        );
        worker.start().unwrap();

        let unknown = clean_review();
        worker.enqueue(unknown.clone());
        let stats = worker.shutdown().await.unwrap();

        assert_eq!(stats.mark_failures, 1);
        assert_eq!(store.orphaned_results().await.len(), 1);
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let store = Arc::new(InMemoryValidationStore::new());
        let worker = FraudWorker::new(
            FraudEngine::new(),
            store.clone(),
            worker_config(50, PersistMode::TwoStep),
        );

        for _ in 0..25 {
            let review = clean_review();
            store.register_review(&review).await;
            worker.enqueue(review);
        }
        worker.start().unwrap();

        let stats = worker.shutdown().await.unwrap();
        assert_eq!(stats.processed, 25);
        assert_eq!(worker.queue_depth(), 0);
        assert!(!worker.is_running());
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_is_dropped() {
        let store = Arc::new(InMemoryValidationStore::new());
        let worker = FraudWorker::new(
            FraudEngine::new(),
            store.clone(),
            worker_config(10, PersistMode::TwoStep),
        );
        worker.start().unwrap();
        worker.shutdown().await.unwrap();

        let review = clean_review();
        store.register_review(&review).await;
        worker.enqueue(review.clone());

        let stats = worker.stats();
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.accepted, 0);
        assert_eq!(
            store.review_state(review.id).await.unwrap().status,
            ReviewStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_insights_after_run() {
        let store = Arc::new(InMemoryValidationStore::new());
        let worker = FraudWorker::new(
            FraudEngine::new(),
            store.clone(),
            worker_config(10, PersistMode::Transactional),
        );
        worker.start().unwrap();

        for review in [clean_review(), clean_review(), spam_review()] {
            store.register_review(&review).await;
            worker.enqueue(review);
        }
        worker.shutdown().await.unwrap();

        let insights = store.insights().await.unwrap();
        assert_eq!(insights.total_validated, 3);
        assert_eq!(insights.approved, 2);
        assert_eq!(insights.rejected, 1);
        assert_eq!(insights.suspicious_count, 1);
        // (88 + 88 + 0) / 3
        assert!((insights.average_score - 176.0 / 3.0).abs() < 1e-9);
    }
}
