//! In-memory validation store
//!
//! Used when PostgreSQL is disabled. Keeps the same contract as the
//! PostgreSQL repository: one result per review, reviews must be registered
//! before they can be marked.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::database::{StorageError, ValidationStore};
use crate::models::{
    Outcome, Review, ReviewStatus, SuspiciousReview, ValidationInsights, ValidationResult,
};

/// Validation-related fields of a review row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewState {
    pub status: ReviewStatus,
    pub suspicious: bool,
    pub validation_result_id: Option<Uuid>,
}

impl ReviewState {
    fn pending() -> Self {
        Self {
            status: ReviewStatus::Pending,
            suspicious: false,
            validation_result_id: None,
        }
    }
}

#[derive(Default)]
struct MemoryState {
    /// result id -> result
    results: HashMap<Uuid, ValidationResult>,
    /// review id -> result id
    results_by_review: HashMap<Uuid, Uuid>,
    /// review ids in the order their results were saved
    save_order: Vec<Uuid>,
    reviews: HashMap<Uuid, ReviewState>,
    /// review ids in registration order
    review_order: Vec<Uuid>,
}

impl MemoryState {
    fn insert_result(&mut self, result: &ValidationResult) -> Result<Uuid, StorageError> {
        if self.results_by_review.contains_key(&result.review_id) {
            return Err(StorageError::DuplicateResult(result.review_id));
        }
        self.results.insert(result.id, result.clone());
        self.results_by_review.insert(result.review_id, result.id);
        self.save_order.push(result.review_id);
        Ok(result.id)
    }

    fn mark(
        &mut self,
        review_id: Uuid,
        validation_result_id: Uuid,
        status: ReviewStatus,
        suspicious: bool,
    ) -> Result<(), StorageError> {
        let state = self
            .reviews
            .get_mut(&review_id)
            .ok_or(StorageError::ReviewNotFound(review_id))?;
        state.status = status;
        state.suspicious = suspicious;
        state.validation_result_id = Some(validation_result_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryValidationStore {
    state: RwLock<MemoryState>,
}

impl InMemoryValidationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a review as pending; no-op if it is already known
    pub async fn register_review(&self, review: &Review) {
        self.register_review_id(review.id).await;
    }

    pub async fn register_review_id(&self, review_id: Uuid) {
        let mut state = self.state.write().await;
        if !state.reviews.contains_key(&review_id) {
            state.reviews.insert(review_id, ReviewState::pending());
            state.review_order.push(review_id);
        }
    }

    pub async fn review_state(&self, review_id: Uuid) -> Option<ReviewState> {
        self.state.read().await.reviews.get(&review_id).copied()
    }

    /// Review ids in the order their results were saved
    pub async fn saved_review_ids(&self) -> Vec<Uuid> {
        self.state.read().await.save_order.clone()
    }

    pub async fn result_count(&self) -> usize {
        self.state.read().await.results.len()
    }

    /// Results no review points at (left behind by a failed mark)
    pub async fn orphaned_results(&self) -> Vec<Uuid> {
        let state = self.state.read().await;
        state
            .save_order
            .iter()
            .filter_map(|review_id| {
                let result_id = state.results_by_review.get(review_id)?;
                let linked = state
                    .reviews
                    .get(review_id)
                    .and_then(|r| r.validation_result_id)
                    == Some(*result_id);
                (!linked).then_some(*result_id)
            })
            .collect()
    }

    /// Delete a result; its signals go with it
    pub async fn delete_validation_result(&self, result_id: Uuid) -> bool {
        let mut state = self.state.write().await;
        match state.results.remove(&result_id) {
            Some(result) => {
                state.results_by_review.remove(&result.review_id);
                state.save_order.retain(|id| *id != result.review_id);
                if let Some(review) = state.reviews.get_mut(&result.review_id) {
                    if review.validation_result_id == Some(result_id) {
                        review.validation_result_id = None;
                    }
                }
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ValidationStore for InMemoryValidationStore {
    async fn save_validation_result(&self, result: &ValidationResult) -> Result<Uuid, StorageError> {
        let id = self.state.write().await.insert_result(result)?;
        debug!(review_id = %result.review_id, result_id = %id, "Validation result stored in memory");
        Ok(id)
    }

    async fn mark_review_validated(
        &self,
        review_id: Uuid,
        validation_result_id: Uuid,
        status: ReviewStatus,
        suspicious: bool,
    ) -> Result<(), StorageError> {
        self.state
            .write()
            .await
            .mark(review_id, validation_result_id, status, suspicious)
    }

    async fn commit_validation(
        &self,
        result: &ValidationResult,
        status: ReviewStatus,
        suspicious: bool,
    ) -> Result<Uuid, StorageError> {
        let mut state = self.state.write().await;

        // Check the review first so a failed commit leaves nothing behind
        if !state.reviews.contains_key(&result.review_id) {
            return Err(StorageError::ReviewNotFound(result.review_id));
        }

        let existing = state.results_by_review.get(&result.review_id).copied();
        let result_id = match existing {
            Some(id) => id,
            None => state.insert_result(result)?,
        };
        state.mark(result.review_id, result_id, status, suspicious)?;
        Ok(result_id)
    }

    async fn get_validation_result(
        &self,
        review_id: Uuid,
    ) -> Result<Option<ValidationResult>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .results_by_review
            .get(&review_id)
            .and_then(|id| state.results.get(id))
            .cloned())
    }

    async fn list_suspicious(&self) -> Result<Vec<SuspiciousReview>, StorageError> {
        let state = self.state.read().await;
        let suspicious = state
            .review_order
            .iter()
            .filter_map(|review_id| {
                let review = state.reviews.get(review_id)?;
                if !review.suspicious {
                    return None;
                }
                Some(SuspiciousReview {
                    review_id: *review_id,
                    status: review.status,
                    result: review
                        .validation_result_id
                        .and_then(|id| state.results.get(&id))
                        .cloned(),
                })
            })
            .collect();
        Ok(suspicious)
    }

    async fn insights(&self) -> Result<ValidationInsights, StorageError> {
        let state = self.state.read().await;
        let mut insights = ValidationInsights {
            total_validated: state.results.len() as u64,
            suspicious_count: state.reviews.values().filter(|r| r.suspicious).count() as u64,
            ..Default::default()
        };

        let mut score_sum = 0.0;
        for result in state.results.values() {
            score_sum += result.score;
            match result.outcome {
                Outcome::Approved => insights.approved += 1,
                Outcome::Flagged => insights.flagged += 1,
                Outcome::Rejected => insights.rejected += 1,
            }
        }
        if insights.total_validated > 0 {
            insights.average_score = score_sum / insights.total_validated as f64;
        }

        Ok(insights)
    }
}
