//! Validation Repository - PostgreSQL persistence for validation results
//!
//! Owns the `validation` schema (results and fraud signals). The `reviews`
//! table belongs to the review service; only its validation columns
//! (`status`, `suspicious`, `validation_result_id`, `updated_at`) are written here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPool, PgRow};
use sqlx::Row;
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::{StorageError, ValidationStore};
use crate::models::{
    Details, FraudSignal, ReviewStatus, Severity, SuspiciousReview, ValidationInsights,
    ValidationResult,
};

pub struct ValidationRepository {
    pool: PgPool,
}

impl ValidationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the validation schema, tables and indexes
    pub async fn init_schema(&self) -> Result<(), StorageError> {
        info!("Initializing validation schema...");

        sqlx::query("CREATE SCHEMA IF NOT EXISTS validation")
            .execute(&self.pool)
            .await?;

        // review_id is unique: a review has at most one result
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS validation.results (
                id UUID PRIMARY KEY,
                review_id UUID NOT NULL UNIQUE,
                score DOUBLE PRECISION NOT NULL,
                outcome VARCHAR(30) NOT NULL,
                checks JSONB NOT NULL DEFAULT '{}'::jsonb,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS validation.fraud_signals (
                id UUID PRIMARY KEY,
                validation_result_id UUID NOT NULL
                    REFERENCES validation.results(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                rule_type VARCHAR(64) NOT NULL,
                severity VARCHAR(10) NOT NULL,
                details JSONB NOT NULL DEFAULT '{}'::jsonb,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_results_score ON validation.results(score)",
            "CREATE INDEX IF NOT EXISTS idx_results_outcome ON validation.results(outcome)",
            "CREATE INDEX IF NOT EXISTS idx_signals_result ON validation.fraud_signals(validation_result_id)",
            "CREATE INDEX IF NOT EXISTS idx_signals_rule ON validation.fraud_signals(rule_type)",
            "CREATE INDEX IF NOT EXISTS idx_signals_severity ON validation.fraud_signals(severity)",
        ] {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        info!("Validation schema initialized");
        Ok(())
    }

    /// Delete a result; its signals cascade
    pub async fn delete_validation_result(&self, result_id: Uuid) -> Result<bool, StorageError> {
        let deleted = sqlx::query("DELETE FROM validation.results WHERE id = $1")
            .bind(result_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn insert_result(
        conn: &mut PgConnection,
        result: &ValidationResult,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO validation.results (id, review_id, score, outcome, checks, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(result.id)
        .bind(result.review_id)
        .bind(result.score)
        .bind(result.outcome.as_str())
        .bind(serde_json::to_value(&result.checks)?)
        .bind(result.created_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| StorageError::from_insert(e, result.review_id))?;

        Self::insert_signals(conn, result).await
    }

    async fn insert_signals(
        conn: &mut PgConnection,
        result: &ValidationResult,
    ) -> Result<(), StorageError> {
        for (position, signal) in result.signals.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO validation.fraud_signals
                    (id, validation_result_id, position, rule_type, severity, details, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(signal.id)
            .bind(result.id)
            .bind(position as i32)
            .bind(&signal.rule_type)
            .bind(signal.severity.as_str())
            .bind(serde_json::to_value(&signal.details)?)
            .bind(result.created_at)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    async fn update_review(
        conn: &mut PgConnection,
        review_id: Uuid,
        validation_result_id: Uuid,
        status: ReviewStatus,
        suspicious: bool,
    ) -> Result<(), StorageError> {
        let updated = sqlx::query(
            r#"
            UPDATE reviews
            SET status = $2, suspicious = $3, validation_result_id = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(review_id)
        .bind(status.as_str())
        .bind(suspicious)
        .bind(validation_result_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(StorageError::ReviewNotFound(review_id));
        }
        Ok(())
    }

    async fn load_result(&self, row: PgRow) -> Result<ValidationResult, StorageError> {
        let id: Uuid = row.try_get("id")?;
        let outcome: String = row.try_get("outcome")?;
        let checks: serde_json::Value = row.try_get("checks")?;

        let signal_rows = sqlx::query(
            r#"
            SELECT id, rule_type, severity, details
            FROM validation.fraud_signals
            WHERE validation_result_id = $1
            ORDER BY position
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut signals = Vec::with_capacity(signal_rows.len());
        for signal_row in signal_rows {
            let severity: String = signal_row.try_get("severity")?;
            let details: serde_json::Value = signal_row.try_get("details")?;
            signals.push(FraudSignal {
                id: signal_row.try_get("id")?,
                validation_result_id: id,
                rule_type: signal_row.try_get("rule_type")?,
                severity: severity
                    .parse::<Severity>()
                    .map_err(StorageError::InvalidValue)?,
                details: serde_json::from_value::<Details>(details)?,
            });
        }

        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        Ok(ValidationResult {
            id,
            review_id: row.try_get("review_id")?,
            score: row.try_get("score")?,
            outcome: outcome.parse().map_err(StorageError::InvalidValue)?,
            checks: serde_json::from_value::<BTreeMap<String, Details>>(checks)?,
            signals,
            created_at,
        })
    }

    async fn get_result_by_id(&self, result_id: Uuid) -> Result<Option<ValidationResult>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT id, review_id, score, outcome, checks, created_at
            FROM validation.results
            WHERE id = $1
            "#,
        )
        .bind(result_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_result(row).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ValidationStore for ValidationRepository {
    async fn save_validation_result(&self, result: &ValidationResult) -> Result<Uuid, StorageError> {
        // Result and signals land together or not at all
        let mut tx = self.pool.begin().await?;
        Self::insert_result(&mut tx, result).await?;
        tx.commit().await?;

        debug!(
            review_id = %result.review_id,
            result_id = %result.id,
            signals = result.signals.len(),
            "Validation result saved"
        );
        Ok(result.id)
    }

    async fn mark_review_validated(
        &self,
        review_id: Uuid,
        validation_result_id: Uuid,
        status: ReviewStatus,
        suspicious: bool,
    ) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        Self::update_review(&mut conn, review_id, validation_result_id, status, suspicious).await?;

        debug!(review_id = %review_id, status = %status, suspicious, "Review marked validated");
        Ok(())
    }

    async fn commit_validation(
        &self,
        result: &ValidationResult,
        status: ReviewStatus,
        suspicious: bool,
    ) -> Result<Uuid, StorageError> {
        let mut tx = self.pool.begin().await?;

        let inserted: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO validation.results (id, review_id, score, outcome, checks, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (review_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(result.id)
        .bind(result.review_id)
        .bind(result.score)
        .bind(result.outcome.as_str())
        .bind(serde_json::to_value(&result.checks)?)
        .bind(result.created_at)
        .fetch_optional(&mut *tx)
        .await?;

        let result_id = match inserted {
            Some(id) => {
                Self::insert_signals(&mut tx, result).await?;
                id
            }
            None => {
                sqlx::query_scalar::<_, Uuid>("SELECT id FROM validation.results WHERE review_id = $1")
                    .bind(result.review_id)
                    .fetch_one(&mut *tx)
                    .await?
            }
        };

        // Dropping the transaction on error rolls the insert back
        Self::update_review(&mut tx, result.review_id, result_id, status, suspicious).await?;
        tx.commit().await?;

        debug!(
            review_id = %result.review_id,
            result_id = %result_id,
            status = %status,
            "Validation committed"
        );
        Ok(result_id)
    }

    async fn get_validation_result(
        &self,
        review_id: Uuid,
    ) -> Result<Option<ValidationResult>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT id, review_id, score, outcome, checks, created_at
            FROM validation.results
            WHERE review_id = $1
            "#,
        )
        .bind(review_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_result(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_suspicious(&self) -> Result<Vec<SuspiciousReview>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, status, validation_result_id
            FROM reviews
            WHERE suspicious = TRUE
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut reviews = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.try_get("status")?;
            let result_id: Option<Uuid> = row.try_get("validation_result_id")?;
            let result = match result_id {
                Some(id) => self.get_result_by_id(id).await?,
                None => None,
            };
            reviews.push(SuspiciousReview {
                review_id: row.try_get("id")?,
                status: status.parse().map_err(StorageError::InvalidValue)?,
                result,
            });
        }
        Ok(reviews)
    }

    async fn insights(&self) -> Result<ValidationInsights, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COALESCE(AVG(score), 0)::DOUBLE PRECISION AS average_score,
                   COUNT(*) FILTER (WHERE outcome = 'approved') AS approved,
                   COUNT(*) FILTER (WHERE outcome = 'flagged') AS flagged,
                   COUNT(*) FILTER (WHERE outcome = 'rejected') AS rejected
            FROM validation.results
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let suspicious: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE suspicious = TRUE")
                .fetch_one(&self.pool)
                .await?;

        let total: i64 = row.try_get("total")?;
        let approved: i64 = row.try_get("approved")?;
        let flagged: i64 = row.try_get("flagged")?;
        let rejected: i64 = row.try_get("rejected")?;

        Ok(ValidationInsights {
            total_validated: total as u64,
            suspicious_count: suspicious as u64,
            average_score: row.try_get("average_score")?,
            approved: approved as u64,
            flagged: flagged as u64,
            rejected: rejected as u64,
        })
    }
}
