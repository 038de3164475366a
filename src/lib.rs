//! CrowdReview Validator
//!
//! Asynchronous fraud validation for user-submitted reviews. Reviews are
//! queued without blocking the submitter, scored against a fixed set of
//! heuristic rules, classified, and the outcome is persisted.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Validation daemon (JSON lines on stdin)
//! ├── config.rs      - Configuration management
//! ├── models/        - Data models
//! │   ├── review.rs     - Review input and review status
//! │   └── validation.rs - Results, fraud signals, insights
//! ├── rules/         - Heuristic fraud rules
//! │   ├── content.rs - Text length, rating discrepancy, language filter
//! │   └── origin.rs  - Geolocation, freshness, IP presence
//! ├── validation/    - Scoring and background processing
//! │   ├── engine.rs  - Score aggregation & classification
//! │   └── worker.rs  - Bounded queue & consumer
//! └── database/      - Persistence
//!     ├── validation.rs - PostgreSQL repository
//!     ├── memory.rs     - In-memory store
//!     └── pool.rs       - Connection pool
//! ```

pub mod config;
pub mod database;
pub mod models;
pub mod rules;
pub mod validation;

// Re-export main types for convenience
pub use config::ValidationConfig;
pub use database::{
    DatabasePool, InMemoryValidationStore, StorageError, ValidationRepository, ValidationStore,
};
pub use models::{
    Details, FraudSignal, Outcome, Review, ReviewStatus, Severity, SuspiciousReview,
    ValidationInsights, ValidationResult,
};
pub use rules::{Rule, RuleContext, RuleSet, RuleVerdict, STANDARD_RULES};
pub use validation::{
    FraudEngine, FraudWorker, PersistMode, ScoringThresholds, WorkerConfig, WorkerError,
    WorkerStatsSnapshot,
};
