//! Review Validation
//!
//! - `engine`: scores a review against the rule set and classifies it
//! - `worker`: bounded queue and single consumer that runs the engine and
//!   persists the outcome

pub mod engine;
pub mod worker;

pub use engine::{FraudEngine, ScoringThresholds, MAX_SCORE, MIN_SCORE};
pub use worker::{
    FraudWorker, PersistMode, WorkerConfig, WorkerError, WorkerStats, WorkerStatsSnapshot,
    FRAUD_QUEUE_NAME,
};
