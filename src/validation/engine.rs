//! Fraud Engine
//!
//! Aggregates rule weights into a bounded confidence score and classifies
//! the review. Pure: no I/O, the input review is never modified.
//!
//! ```text
//! score = clamp(baseline + Σ weight, 0, 100)
//!
//!   score < reject_below  -> rejected
//!   score < flag_below    -> flagged
//!   otherwise             -> approved
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::models::{FraudSignal, Outcome, Review, ValidationResult};
use crate::rules::{RuleContext, RuleSet};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Scoring baseline and classification thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringThresholds {
    /// Score before any rule is applied
    pub baseline: f64,

    /// Scores below this are flagged
    pub flag_below: f64,

    /// Scores below this are rejected; must not exceed `flag_below`
    pub reject_below: f64,
}

impl Default for ScoringThresholds {
    fn default() -> Self {
        Self {
            baseline: 50.0,
            flag_below: 55.0,
            reject_below: 40.0,
        }
    }
}

impl ScoringThresholds {
    /// Stricter bound first, so `rejected` stays reachable
    pub fn classify(&self, score: f64) -> Outcome {
        if score < self.reject_below {
            Outcome::Rejected
        } else if score < self.flag_below {
            Outcome::Flagged
        } else {
            Outcome::Approved
        }
    }
}

/// Runs the rule set and builds the validation record
#[derive(Debug, Clone, Default)]
pub struct FraudEngine {
    rules: RuleSet,
    thresholds: ScoringThresholds,
}

impl FraudEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: ScoringThresholds) -> Self {
        Self {
            rules: RuleSet::standard(),
            thresholds,
        }
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub fn thresholds(&self) -> &ScoringThresholds {
        &self.thresholds
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Evaluate against the wall clock. Returns the result and whether the
    /// review is suspicious (anything but `approved`).
    pub fn evaluate(&self, review: &Review) -> (ValidationResult, bool) {
        self.evaluate_at(review, Utc::now())
    }

    /// Evaluate as of `now`. Identical inputs give identical results apart from
    /// the generated ids and `created_at`.
    pub fn evaluate_at(&self, review: &Review, now: DateTime<Utc>) -> (ValidationResult, bool) {
        let verdicts = self.rules.evaluate(review, &RuleContext::at(now));
        let result_id = Uuid::new_v4();

        let mut raw = self.thresholds.baseline;
        let mut checks = BTreeMap::new();
        let mut signals = Vec::new();

        for verdict in verdicts {
            raw += verdict.weight;
            if !verdict.passed {
                signals.push(FraudSignal {
                    id: Uuid::new_v4(),
                    validation_result_id: result_id,
                    rule_type: verdict.name.clone(),
                    severity: verdict.severity,
                    details: verdict.details.clone(),
                });
            }
            checks.insert(verdict.name, verdict.details);
        }

        let score = raw.clamp(MIN_SCORE, MAX_SCORE);
        let outcome = self.thresholds.classify(score);

        let result = ValidationResult {
            id: result_id,
            review_id: review.id,
            score,
            outcome,
            checks,
            signals,
            created_at: now,
        };

        (result, outcome.is_suspicious())
    }
}
