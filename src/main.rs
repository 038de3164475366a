use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{Level, info, warn};
use tracing_subscriber::fmt::format::FmtSpan;

use crowdreview_validator::{
    DatabasePool, FraudEngine, FraudWorker, InMemoryValidationStore, Review, ValidationConfig,
    ValidationStore,
};

/// Where validation outcomes are written
enum Storage {
    Postgres(DatabasePool),
    Memory(Arc<InMemoryValidationStore>),
}

impl Storage {
    async fn connect(config: &ValidationConfig) -> Result<Self> {
        if !config.database.postgres_enabled {
            info!("Using in-memory validation store");
            return Ok(Storage::Memory(Arc::new(InMemoryValidationStore::new())));
        }

        let pool = DatabasePool::new(
            &config.database.postgres_url,
            config.database.max_connections,
        )
        .await
        .context("Failed to open PostgreSQL pool")?;
        pool.init_schema()
            .await
            .context("Failed to initialize validation schema")?;
        Ok(Storage::Postgres(pool))
    }

    fn store(&self) -> Arc<dyn ValidationStore> {
        match self {
            Storage::Postgres(pool) => pool.validation(),
            Storage::Memory(store) => store.clone(),
        }
    }

    /// The in-memory store has no review-creation collaborator, so reviews
    /// are registered here before they are queued
    async fn admit(&self, review: &Review) {
        if let Storage::Memory(store) = self {
            store.register_review(review).await;
        }
    }

    async fn close(&self) {
        if let Storage::Postgres(pool) = self {
            pool.close().await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ValidationConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {:#}", e);
        eprintln!("Please check CROWDREVIEW_* environment variables.");
        e
    })?;

    init_logging(&config)?;

    info!("Starting CrowdReview fraud validator");
    info!(
        "Queue capacity: {}, job timeout: {}s, persist mode: {}",
        config.worker.queue_capacity, config.worker.job_timeout_secs, config.worker.persist_mode
    );

    let storage = Storage::connect(&config).await?;
    let store = storage.store();

    let engine = FraudEngine::with_thresholds(config.scoring.to_thresholds());
    let worker = FraudWorker::new(engine, store.clone(), config.worker.to_worker_config());
    worker.start()?;

    let submitted = tokio::select! {
        result = ingest_stdin(&worker, &storage) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, stopping ingestion");
            0
        }
    };
    info!("Ingestion finished after {} review(s)", submitted);

    let stats = worker.shutdown().await?;
    info!(
        "Worker stats: accepted={}, dropped={}, processed={}, timed_out={}, save_failures={}, mark_failures={}",
        stats.accepted,
        stats.dropped,
        stats.processed,
        stats.timed_out,
        stats.save_failures,
        stats.mark_failures
    );

    match store.insights().await {
        Ok(insights) => info!(
            "Insights: validated={}, suspicious={}, average_score={:.1}, approved={}, flagged={}, rejected={}",
            insights.total_validated,
            insights.suspicious_count,
            insights.average_score,
            insights.approved,
            insights.flagged,
            insights.rejected
        ),
        Err(e) => warn!("Failed to load validation insights: {}", e),
    }

    storage.close().await;
    Ok(())
}

/// Read one JSON review per line and queue it. Malformed lines are skipped.
async fn ingest_stdin(worker: &FraudWorker, storage: &Storage) -> Result<u64> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut submitted = 0u64;

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Review>(line) {
            Ok(review) => {
                storage.admit(&review).await;
                worker.enqueue(review);
                submitted += 1;
            }
            Err(e) => warn!("Skipping malformed review line: {}", e),
        }
    }

    Ok(submitted)
}

fn init_logging(config: &ValidationConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_span_events(if config.logging.log_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
