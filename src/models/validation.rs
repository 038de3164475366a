//! Validation result models
//!
//! A `ValidationResult` is written once per review and never mutated. Its
//! `FraudSignal` children exist only under their parent result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::ReviewStatus;

/// Diagnostic evidence attached to a rule verdict (key -> JSON value)
pub type Details = BTreeMap<String, serde_json::Value>;

/// Severity of a failed rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("Unknown severity: {}", other)),
        }
    }
}

/// Final classification of a scored review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Approved,
    Flagged,
    Rejected,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Approved => "approved",
            Outcome::Flagged => "flagged",
            Outcome::Rejected => "rejected",
        }
    }

    pub fn is_suspicious(&self) -> bool {
        !matches!(self, Outcome::Approved)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(Outcome::Approved),
            "flagged" => Ok(Outcome::Flagged),
            "rejected" => Ok(Outcome::Rejected),
            other => Err(format!("Unknown outcome: {}", other)),
        }
    }
}

/// One failed rule recorded against a validation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudSignal {
    pub id: Uuid,

    /// Parent result; signals are removed with it
    pub validation_result_id: Uuid,

    /// Name of the rule that failed
    pub rule_type: String,

    pub severity: Severity,

    pub details: Details,
}

/// Fraud engine output for a single review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub id: Uuid,

    /// Review this result belongs to (at most one result per review)
    pub review_id: Uuid,

    /// Confidence score, 0-100
    pub score: f64,

    pub outcome: Outcome,

    /// Details of every rule, keyed by rule name, kept for audit
    pub checks: BTreeMap<String, Details>,

    /// One entry per failed rule, in rule declaration order
    pub signals: Vec<FraudSignal>,

    pub created_at: DateTime<Utc>,
}

impl ValidationResult {
    pub fn is_suspicious(&self) -> bool {
        self.outcome.is_suspicious()
    }

    /// Names of the rules that produced a signal
    pub fn failed_rules(&self) -> Vec<&str> {
        self.signals.iter().map(|s| s.rule_type.as_str()).collect()
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.signals.iter().map(|s| s.severity).max()
    }
}

/// A review the store holds as suspicious, with its validation result if linked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspiciousReview {
    pub review_id: Uuid,
    pub status: ReviewStatus,
    pub result: Option<ValidationResult>,
}

/// Aggregate figures over stored validation results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationInsights {
    pub total_validated: u64,
    /// Reviews currently marked suspicious
    pub suspicious_count: u64,
    pub average_score: f64,
    pub approved: u64,
    pub flagged: u64,
    pub rejected: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_suspicious() {
        assert!(!Outcome::Approved.is_suspicious());
        assert!(Outcome::Flagged.is_suspicious());
        assert!(Outcome::Rejected.is_suspicious());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!("high".parse::<Severity>().unwrap(), Severity::High);
        assert!("critical".parse::<Severity>().is_err());
    }

    #[test]
    fn test_outcome_serializes_lowercase() {
        let json = serde_json::to_string(&Outcome::Rejected).unwrap();
        assert_eq!(json, "\"rejected\"");
    }
}
