//! Origin rules: where and when the review came from

use chrono::Duration;
use serde_json::json;

use super::{details, RuleContext, RuleVerdict};
use crate::models::{Review, Severity};

pub(super) const GEOLOCATION: &str = "geolocation";
pub(super) const FRESHNESS: &str = "freshness";
pub(super) const IP_PRESENCE: &str = "ip_presence";

/// Sentinel geo tag meaning the lookup failed
pub const UNKNOWN_GEO: &str = "unknown";

/// Reviews younger than this are treated as fresh
pub const FRESHNESS_WINDOW_HOURS: i64 = 24;

pub fn geolocation(review: &Review, _ctx: &RuleContext) -> RuleVerdict {
    let geo = review.geo_location.as_str();
    RuleVerdict::decide(
        GEOLOCATION,
        !geo.is_empty() && geo != UNKNOWN_GEO,
        4.0,
        -5.0,
        Severity::Low,
        details([("geo", json!(geo))]),
    )
}

/// Fails while the review is younger than the freshness window at evaluation time
pub fn freshness(review: &Review, ctx: &RuleContext) -> RuleVerdict {
    let age = review.age_at(ctx.now);
    let fresh = age < Duration::hours(FRESHNESS_WINDOW_HOURS);
    RuleVerdict::decide(
        FRESHNESS,
        !fresh,
        6.0,
        -12.0,
        Severity::Medium,
        details([("fresh", json!(fresh)), ("age_hours", json!(age.num_hours()))]),
    )
}

// Presence only: per-IP frequency lives in the rate limiter, not here.
pub fn ip_presence(review: &Review, _ctx: &RuleContext) -> RuleVerdict {
    RuleVerdict::decide(
        IP_PRESENCE,
        !review.ip_address.is_empty(),
        5.0,
        -10.0,
        Severity::Medium,
        details([("ip", json!(review.ip_address))]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ctx() -> RuleContext {
        RuleContext::at(Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_geolocation() {
        let pass = geolocation(&Review::new(3, "t", "c").with_geo("US"), &ctx());
        assert!(pass.passed);
        assert_eq!(pass.weight, 4.0);

        for geo in ["", "unknown"] {
            let fail = geolocation(&Review::new(3, "t", "c").with_geo(geo), &ctx());
            assert!(!fail.passed, "geo {:?} should fail", geo);
            assert_eq!(fail.weight, -5.0);
            assert_eq!(fail.severity, Severity::Low);
            assert_eq!(fail.details["geo"], json!(geo));
        }
    }

    #[test]
    fn test_freshness_window_boundary() {
        let ctx = ctx();

        let exactly_day_old = Review::new(3, "t", "c").with_created_at(ctx.now - Duration::hours(24));
        let verdict = freshness(&exactly_day_old, &ctx);
        assert!(verdict.passed);
        assert_eq!(verdict.weight, 6.0);
        assert_eq!(verdict.details["fresh"], json!(false));

        let almost_day_old = Review::new(3, "t", "c")
            .with_created_at(ctx.now - Duration::hours(24) + Duration::seconds(1));
        let verdict = freshness(&almost_day_old, &ctx);
        assert!(!verdict.passed);
        assert_eq!(verdict.weight, -12.0);
        assert_eq!(verdict.severity, Severity::Medium);
        assert_eq!(verdict.details["fresh"], json!(true));
    }

    #[test]
    fn test_freshness_future_timestamp_is_fresh() {
        let ctx = ctx();
        let review = Review::new(3, "t", "c").with_created_at(ctx.now + Duration::hours(2));
        assert!(!freshness(&review, &ctx).passed);
    }

    #[test]
    fn test_ip_presence() {
        let pass = ip_presence(&Review::new(3, "t", "c").with_ip("1.2.3.4"), &ctx());
        assert!(pass.passed);
        assert_eq!(pass.details["ip"], json!("1.2.3.4"));

        let fail = ip_presence(&Review::new(3, "t", "c"), &ctx());
        assert!(!fail.passed);
        assert_eq!(fail.weight, -10.0);
    }
}
