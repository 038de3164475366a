//! Fraud Rules
//!
//! Independent, pure checks over a single review. Each rule produces a
//! `RuleVerdict` carrying a signed weight that the scoring engine adds to its
//! baseline.
//!
//! | Rule               | Passes when                         | Pass | Fail | Fail severity |
//! |--------------------|-------------------------------------|------|------|---------------|
//! | text_length        | at least 20 words                   | +10  | -15  | medium        |
//! | rating_discrepancy | rating is not 1 or 5                | +5   | -10  | medium        |
//! | language_filter    | no banned phrase in the content     | +8   | -25  | high          |
//! | geolocation        | geo tag present and not "unknown"   | +4   | -5   | low           |
//! | freshness          | review is at least 24h old          | +6   | -12  | medium        |
//! | ip_presence        | submitter IP present                | +5   | -10  | medium        |
//!
//! Adding a rule means writing one more `fn(&Review, &RuleContext) -> RuleVerdict`
//! and appending it to the set; aggregation does not change.

mod content;
mod origin;

pub use content::{
    language_filter, rating_discrepancy, text_length, BANNED_PHRASES, MIN_WORD_COUNT,
};
pub use origin::{freshness, geolocation, ip_presence, FRESHNESS_WINDOW_HOURS, UNKNOWN_GEO};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Details, Review, Severity};

/// Verdict of one rule for one review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleVerdict {
    pub name: String,
    pub passed: bool,
    /// Signed contribution to the confidence score
    pub weight: f64,
    pub severity: Severity,
    pub details: Details,
}

impl RuleVerdict {
    /// Build a verdict from a pass/fail decision and the rule's weight table.
    /// Passing verdicts are always `low` severity.
    pub fn decide(
        name: &str,
        passed: bool,
        pass_weight: f64,
        fail_weight: f64,
        fail_severity: Severity,
        details: Details,
    ) -> Self {
        Self {
            name: name.to_string(),
            passed,
            weight: if passed { pass_weight } else { fail_weight },
            severity: if passed { Severity::Low } else { fail_severity },
            details,
        }
    }
}

/// Inputs a rule may need besides the review itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleContext {
    /// Evaluation instant
    pub now: DateTime<Utc>,
}

impl RuleContext {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

/// Signature every rule implements
pub type RuleFn = fn(&Review, &RuleContext) -> RuleVerdict;

/// A named rule in the evaluation list
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub check: RuleFn,
}

impl Rule {
    pub const fn new(name: &'static str, check: RuleFn) -> Self {
        Self { name, check }
    }
}

/// The built-in rules, in declaration order
pub const STANDARD_RULES: [Rule; 6] = [
    Rule::new(content::TEXT_LENGTH, text_length),
    Rule::new(content::RATING_DISCREPANCY, rating_discrepancy),
    Rule::new(content::LANGUAGE_FILTER, language_filter),
    Rule::new(origin::GEOLOCATION, geolocation),
    Rule::new(origin::FRESHNESS, freshness),
    Rule::new(origin::IP_PRESENCE, ip_presence),
];

/// Ordered collection of rules evaluated against every review
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn standard() -> Self {
        Self {
            rules: STANDARD_RULES.to_vec(),
        }
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule; it is evaluated after the existing ones
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    /// Run every rule in order
    pub fn evaluate(&self, review: &Review, ctx: &RuleContext) -> Vec<RuleVerdict> {
        self.rules.iter().map(|rule| (rule.check)(review, ctx)).collect()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}

/// Build a details map from key/value pairs
pub(crate) fn details<const N: usize>(pairs: [(&str, serde_json::Value); N]) -> Details {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
