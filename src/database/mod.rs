//! Validation Storage
//!
//! The worker writes through the `ValidationStore` trait. Two backends:
//! - `ValidationRepository`: PostgreSQL via sqlx
//! - `InMemoryValidationStore`: fallback when PostgreSQL is disabled

pub mod error;
pub mod memory;
pub mod pool;
pub mod validation;

pub use error::StorageError;
pub use memory::InMemoryValidationStore;
pub use pool::DatabasePool;
pub use validation::ValidationRepository;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{ReviewStatus, SuspiciousReview, ValidationInsights, ValidationResult};

/// Persistence for validation results and the review fields they drive
#[async_trait]
pub trait ValidationStore: Send + Sync {
    /// Insert a result together with its fraud signals. Fails with
    /// `DuplicateResult` if the review already has one.
    async fn save_validation_result(&self, result: &ValidationResult) -> Result<Uuid, StorageError>;

    /// Point the review at its result and record status and suspicious flag
    async fn mark_review_validated(
        &self,
        review_id: Uuid,
        validation_result_id: Uuid,
        status: ReviewStatus,
        suspicious: bool,
    ) -> Result<(), StorageError>;

    /// Save and mark in one atomic write. Idempotent per review: if a result
    /// already exists its id is returned and the review is re-linked to it.
    async fn commit_validation(
        &self,
        result: &ValidationResult,
        status: ReviewStatus,
        suspicious: bool,
    ) -> Result<Uuid, StorageError>;

    async fn get_validation_result(
        &self,
        review_id: Uuid,
    ) -> Result<Option<ValidationResult>, StorageError>;

    /// Reviews currently marked suspicious, oldest first
    async fn list_suspicious(&self) -> Result<Vec<SuspiciousReview>, StorageError>;

    async fn insights(&self) -> Result<ValidationInsights, StorageError>;
}
