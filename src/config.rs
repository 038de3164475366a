use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::warn;

use crate::validation::{PersistMode, ScoringThresholds, WorkerConfig, MAX_SCORE, MIN_SCORE};

/// Configuration for the review validation service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Queue and consumer settings
    pub worker: WorkerSettings,
    /// Score baseline and classification thresholds
    pub scoring: ScoringConfig,
    /// Storage backend
    pub database: DatabaseConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Maximum reviews waiting for validation; further enqueues are dropped
    pub queue_capacity: usize,
    /// Deadline for a single validation job
    pub job_timeout_secs: u64,
    pub persist_mode: PersistMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub baseline: f64,
    /// Scores below this are flagged
    pub flag_threshold: f64,
    /// Scores below this are rejected
    pub reject_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub postgres_url: String,
    /// Falls back to the in-memory store when disabled
    pub postgres_enabled: bool,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Emit span open/close events
    pub log_spans: bool,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            job_timeout_secs: 5,
            persist_mode: PersistMode::TwoStep,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let thresholds = ScoringThresholds::default();
        Self {
            baseline: thresholds.baseline,
            flag_threshold: thresholds.flag_below,
            reject_threshold: thresholds.reject_below,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            postgres_url: "postgresql://localhost:5432/crowdreview".to_string(),
            postgres_enabled: false,
            max_connections: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_spans: false,
        }
    }
}

impl ScoringConfig {
    pub fn to_thresholds(&self) -> ScoringThresholds {
        ScoringThresholds {
            baseline: self.baseline,
            flag_below: self.flag_threshold,
            reject_below: self.reject_threshold,
        }
    }
}

impl WorkerSettings {
    pub fn to_worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            queue_capacity: self.queue_capacity,
            job_timeout: Duration::from_secs(self.job_timeout_secs),
            persist_mode: self.persist_mode,
        }
    }
}

impl ValidationConfig {
    /// Load configuration from `CROWDREVIEW_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup; unset keys keep defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Worker configuration
        if let Some(capacity) = lookup("CROWDREVIEW_QUEUE_CAPACITY") {
            config.worker.queue_capacity = capacity
                .parse()
                .context("Invalid CROWDREVIEW_QUEUE_CAPACITY value")?;
        }

        if let Some(timeout) = lookup("CROWDREVIEW_JOB_TIMEOUT_SECS") {
            config.worker.job_timeout_secs = timeout
                .parse()
                .context("Invalid CROWDREVIEW_JOB_TIMEOUT_SECS value")?;
        }

        if let Some(mode) = lookup("CROWDREVIEW_PERSIST_MODE") {
            config.worker.persist_mode = mode
                .parse()
                .map_err(anyhow::Error::msg)
                .context("Invalid CROWDREVIEW_PERSIST_MODE value")?;
        }

        // Scoring configuration
        if let Some(baseline) = lookup("CROWDREVIEW_SCORE_BASELINE") {
            config.scoring.baseline = baseline
                .parse()
                .context("Invalid CROWDREVIEW_SCORE_BASELINE value")?;
        }

        if let Some(threshold) = lookup("CROWDREVIEW_FLAG_THRESHOLD") {
            config.scoring.flag_threshold = threshold
                .parse()
                .context("Invalid CROWDREVIEW_FLAG_THRESHOLD value")?;
        }

        if let Some(threshold) = lookup("CROWDREVIEW_REJECT_THRESHOLD") {
            config.scoring.reject_threshold = threshold
                .parse()
                .context("Invalid CROWDREVIEW_REJECT_THRESHOLD value")?;
        }

        // Database configuration
        if let Some(url) = lookup("CROWDREVIEW_POSTGRES_URL") {
            config.database.postgres_url = url;
        }

        if let Some(enabled) = lookup("CROWDREVIEW_POSTGRES_ENABLED") {
            config.database.postgres_enabled = enabled
                .parse()
                .context("Invalid CROWDREVIEW_POSTGRES_ENABLED value")?;
        }

        if let Some(max) = lookup("CROWDREVIEW_POSTGRES_MAX_CONNECTIONS") {
            config.database.max_connections = max
                .parse()
                .context("Invalid CROWDREVIEW_POSTGRES_MAX_CONNECTIONS value")?;
        }

        // Logging configuration
        if let Some(level) = lookup("CROWDREVIEW_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Some(spans) = lookup("CROWDREVIEW_LOG_SPANS") {
            config.logging.log_spans = spans
                .parse()
                .context("Invalid CROWDREVIEW_LOG_SPANS value")?;
        }

        if !config.database.postgres_enabled {
            warn!("PostgreSQL disabled, validation results are kept in memory only");
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for consistency
    pub fn validate(&self) -> Result<()> {
        if self.worker.queue_capacity == 0 {
            return Err(anyhow::anyhow!("Queue capacity must be non-zero"));
        }

        if self.worker.job_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Job timeout must be non-zero"));
        }

        let scoring = &self.scoring;
        for (name, value) in [
            ("baseline", scoring.baseline),
            ("flag threshold", scoring.flag_threshold),
            ("reject threshold", scoring.reject_threshold),
        ] {
            if !(MIN_SCORE..=MAX_SCORE).contains(&value) {
                return Err(anyhow::anyhow!(
                    "Score {} must be within [{}, {}], got {}",
                    name,
                    MIN_SCORE,
                    MAX_SCORE,
                    value
                ));
            }
        }

        if scoring.reject_threshold > scoring.flag_threshold {
            return Err(anyhow::anyhow!(
                "Reject threshold ({}) cannot exceed flag threshold ({})",
                scoring.reject_threshold,
                scoring.flag_threshold
            ));
        }

        if self.database.postgres_enabled {
            if self.database.postgres_url.is_empty() {
                return Err(anyhow::anyhow!(
                    "PostgreSQL is enabled but CROWDREVIEW_POSTGRES_URL is empty"
                ));
            }
            if self.database.max_connections == 0 {
                return Err(anyhow::anyhow!("PostgreSQL max connections must be non-zero"));
            }
        }

        Ok(())
    }
}
