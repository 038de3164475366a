//! Content rules: length, rating extremity, banned language

use serde_json::json;

use super::{details, RuleContext, RuleVerdict};
use crate::models::{Review, Severity};

pub(super) const TEXT_LENGTH: &str = "text_length";
pub(super) const RATING_DISCREPANCY: &str = "rating_discrepancy";
pub(super) const LANGUAGE_FILTER: &str = "language_filter";

/// Minimum number of words for a review to count as substantive
pub const MIN_WORD_COUNT: usize = 20;

/// Phrases matched as literal lowercase substrings of the content
pub const BANNED_PHRASES: [&str; 5] = ["free money", "click here", "guaranteed", "fake", "scam"];

/// Short reviews carry little evidence of a genuine experience
pub fn text_length(review: &Review, _ctx: &RuleContext) -> RuleVerdict {
    let words = review.word_count();
    RuleVerdict::decide(
        TEXT_LENGTH,
        words >= MIN_WORD_COUNT,
        10.0,
        -15.0,
        Severity::Medium,
        details([("word_count", json!(words))]),
    )
}

/// One- and five-star ratings are the usual shape of paid or retaliatory reviews
pub fn rating_discrepancy(review: &Review, _ctx: &RuleContext) -> RuleVerdict {
    RuleVerdict::decide(
        RATING_DISCREPANCY,
        review.rating != 1 && review.rating != 5,
        5.0,
        -10.0,
        Severity::Medium,
        details([("rating", json!(review.rating))]),
    )
}

pub fn language_filter(review: &Review, _ctx: &RuleContext) -> RuleVerdict {
    let lower = review.content.to_lowercase();
    let hit = BANNED_PHRASES.iter().find(|phrase| lower.contains(*phrase));

    let mut evidence = details([("matched", json!(hit.is_some()))]);
    if let Some(phrase) = hit {
        evidence.insert("phrase".to_string(), json!(phrase));
    }

    RuleVerdict::decide(
        LANGUAGE_FILTER,
        hit.is_none(),
        8.0,
        -25.0,
        Severity::High,
        evidence,
    )
}
