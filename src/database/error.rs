//! Storage errors

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to encode or decode stored JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("review {0} not found")]
    ReviewNotFound(Uuid),

    #[error("review {0} already has a validation result")]
    DuplicateResult(Uuid),

    #[error("invalid stored value: {0}")]
    InvalidValue(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Map a unique-constraint violation on insert to `DuplicateResult`
    pub(crate) fn from_insert(err: sqlx::Error, review_id: Uuid) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StorageError::DuplicateResult(review_id)
            }
            _ => StorageError::Database(err),
        }
    }
}
