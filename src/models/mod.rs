//! Validation data models
//!
//! Contains the data structures that flow through the fraud pipeline:
//! - Reviews handed in by the review-creation collaborator
//! - Validation results and their fraud signals
//! - Outcome, status and severity tags

pub mod review;
pub mod validation;

pub use review::{Review, ReviewStatus};
pub use validation::{
    Details, FraudSignal, Outcome, Severity, SuspiciousReview, ValidationInsights,
    ValidationResult,
};
