use redis::AsyncCommands;
use serde::Serialize;

use crate::cache::CacheService;

/// Violations stay on record this long after the last one.
const VIOLATION_MEMORY_SECS: u64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Penalty {
    None,
    Moderate,
    Severe,
}

impl Penalty {
    /// Repeat offenders wait longer: twice as long after two violations,
    /// four times after five.
    pub fn for_violations(violations: u64) -> Self {
        match violations {
            v if v > 5 => Penalty::Severe,
            v if v > 2 => Penalty::Moderate,
            _ => Penalty::None,
        }
    }

    pub fn multiplier(&self) -> u64 {
        match self {
            Penalty::None => 1,
            Penalty::Moderate => 2,
            Penalty::Severe => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Penalty::None => "none",
            Penalty::Moderate => "moderate",
            Penalty::Severe => "severe",
        }
    }
}

/// Outcome of counting one request against a fixed window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Seconds until the current window closes.
    pub reset_secs: u64,
    pub retry_after: Option<u64>,
    pub penalty: Penalty,
}

impl RateDecision {
    /// Builds the decision from the window counter and, when over the limit,
    /// the running violation count.
    pub fn evaluate(count: u64, limit: u64, reset_secs: u64, violations: u64) -> Self {
        if count <= limit {
            return RateDecision {
                allowed: true,
                limit,
                remaining: limit - count,
                reset_secs,
                retry_after: None,
                penalty: Penalty::None,
            };
        }
        let penalty = Penalty::for_violations(violations);
        RateDecision {
            allowed: false,
            limit,
            remaining: 0,
            reset_secs,
            retry_after: Some(reset_secs.max(1) * penalty.multiplier()),
            penalty,
        }
    }
}

impl CacheService {
    /// Counts a request for `key` in a fixed window of `window_secs`.
    pub async fn hit_rate_limit(&self, key: &str, limit: u64, window_secs: u64) -> Result<RateDecision, redis::RedisError> {
        let counter = format!("ratelimit:{key}");
        let mut conn = self.redis.conn.clone();

        let (count, ttl): (u64, i64) = redis::pipe()
            .atomic()
            .incr(&counter, 1u64)
            .cmd("EXPIRE").arg(&counter).arg(window_secs).arg("NX").ignore()
            .ttl(&counter)
            .query_async(&mut conn)
            .await?;
        let reset_secs = u64::try_from(ttl).unwrap_or(window_secs);

        if count <= limit {
            return Ok(RateDecision::evaluate(count, limit, reset_secs, 0));
        }

        let strikes = format!("ratelimit:{key}:violations");
        let violations: u64 = conn.incr(&strikes, 1u64).await?;
        let _: () = conn.expire(&strikes, VIOLATION_MEMORY_SECS as i64).await?;

        Ok(RateDecision::evaluate(count, limit, reset_secs, violations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_limit_reports_remaining() {
        let decision = RateDecision::evaluate(3, 10, 42, 0);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 7);
        assert_eq!(decision.retry_after, None);
    }

    #[test]
    fn penalties_escalate_with_violations() {
        assert_eq!(RateDecision::evaluate(11, 10, 30, 1).retry_after, Some(30));
        assert_eq!(RateDecision::evaluate(11, 10, 30, 3).retry_after, Some(60));
        let severe = RateDecision::evaluate(11, 10, 30, 6);
        assert_eq!(severe.retry_after, Some(120));
        assert_eq!(severe.penalty, Penalty::Severe);
        assert!(!severe.allowed);
        assert_eq!(severe.remaining, 0);
    }

    #[test]
    fn penalty_thresholds() {
        assert_eq!(Penalty::for_violations(2), Penalty::None);
        assert_eq!(Penalty::for_violations(3), Penalty::Moderate);
        assert_eq!(Penalty::for_violations(5), Penalty::Moderate);
        assert_eq!(Penalty::for_violations(6), Penalty::Severe);
    }
}
