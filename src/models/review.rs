//! Review model
//!
//! A review is owned by the review-creation collaborator. The pipeline only
//! reads it; the validation outcome is written back through the store.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A user-submitted review awaiting validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,

    /// Author of the review
    #[serde(default = "Uuid::nil")]
    pub user_id: Uuid,

    /// Company being reviewed
    #[serde(default = "Uuid::nil")]
    pub company_id: Uuid,

    /// Star rating, 1-5 (range checked upstream)
    pub rating: u8,

    #[serde(default)]
    pub title: String,

    pub content: String,

    /// Submitter IP address, may be empty
    #[serde(default)]
    pub ip_address: String,

    /// Geo tag, may be empty or "unknown"
    #[serde(default)]
    pub geo_location: String,

    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn new(rating: u8, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            company_id: Uuid::nil(),
            rating,
            title: title.into(),
            content: content.into(),
            ip_address: String::new(),
            geo_location: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = ip.into();
        self
    }

    pub fn with_geo(mut self, geo: impl Into<String>) -> Self {
        self.geo_location = geo.into();
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Time elapsed between submission and `now` (negative if submitted in the future)
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.created_at)
    }

    /// Whitespace-separated word count of the content
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

/// Moderation status stored on the review row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    /// Created, not yet validated
    Pending,
    Approved,
    Flagged,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Flagged => "flagged",
            ReviewStatus::Rejected => "rejected",
        }
    }

    /// Status written by the worker after scoring.
    ///
    /// The worker only distinguishes clean from suspicious reviews; `rejected`
    /// is reserved for moderator decisions.
    pub fn from_suspicious(suspicious: bool) -> Self {
        if suspicious {
            ReviewStatus::Flagged
        } else {
            ReviewStatus::Approved
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReviewStatus::Pending),
            "approved" => Ok(ReviewStatus::Approved),
            "flagged" => Ok(ReviewStatus::Flagged),
            "rejected" => Ok(ReviewStatus::Rejected),
            other => Err(format!("Unknown review status: {}", other)),
        }
    }
}
