//! Retry policy for transient failures.
//!
//! Delays follow the Fibonacci sequence (1, 1, 2, 3, 5, 8, ... units) rather
//! than doubling. A 429 with a usable `Retry-After` header overrides the
//! schedule for that attempt.

use crate::error::ApiError;
use std::time::{Duration, SystemTime};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default ceiling on any single retry delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum retries per request (default: 5). Total attempts are
    /// `max_attempts + 1`.
    pub max_attempts: u32,
    /// Length of one Fibonacci step (default: 1 second).
    pub unit: Duration,
    /// Upper bound on one delay, `Retry-After` included (default: 60 seconds).
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            unit: Duration::from_secs(1),
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Disable retries entirely.
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }

    /// Fibonacci delay for a zero-based retry attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.unit
            .saturating_mul(fibonacci(attempt).min(u32::MAX as u64) as u32)
            .min(self.max_delay)
    }

    /// Delay before retrying `error`, which failed on retry attempt `attempt`.
    pub fn delay_for(&self, attempt: u32, error: &ApiError) -> Duration {
        if error.is_rate_limit_error() {
            if let Some(delay) = error
                .retry_after
                .as_deref()
                .and_then(|v| parse_retry_after(v, SystemTime::now()))
            {
                return delay.min(self.max_delay);
            }
        }
        self.backoff(attempt)
    }
}

/// Per-request retry bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Retries performed so far.
    pub attempt: u32,
    /// Bound on `attempt`.
    pub max_attempts: u32,
}

impl RetryState {
    /// Fresh state for one logical request.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
        }
    }

    /// Whether another retry is allowed.
    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Record a retry. Returns the attempt index the delay should be computed for.
    pub fn advance(&mut self) -> u32 {
        let current = self.attempt;
        self.attempt += 1;
        current
    }
}

/// `fibonacci(0) = 1, fibonacci(1) = 1, fibonacci(2) = 2, ...`
pub fn fibonacci(n: u32) -> u64 {
    let (mut a, mut b) = (1u64, 1u64);
    for _ in 0..n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    a
}

/// Parse a `Retry-After` value given as delta-seconds or an HTTP-date.
///
/// Dates in the past yield a zero delay.
pub fn parse_retry_after(value: &str, now: SystemTime) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = httpdate::parse_http_date(value).ok()?;
    Some(at.duration_since(now).unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn rate_limited(retry_after: Option<&'static str>) -> ApiError {
        let mut headers = HeaderMap::new();
        if let Some(v) = retry_after {
            headers.insert("retry-after", HeaderValue::from_static(v));
        }
        ApiError::from_response(429, &headers, b"")
    }

    #[test]
    fn test_fibonacci_sequence() {
        let seq: Vec<u64> = (0..8).map(fibonacci).collect();
        assert_eq!(seq, vec![1, 1, 2, 3, 5, 8, 13, 21]);
    }

    #[test]
    fn test_default_backoff_schedule() {
        let policy = RetryPolicy::default();
        let delays: Vec<u128> = (0..5).map(|n| policy.backoff(n).as_millis()).collect();
        assert_eq!(delays, vec![1000, 1000, 2000, 3000, 5000]);
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::default();
        assert!(policy.backoff(200) >= policy.backoff(20));
    }

    #[test]
    fn test_retry_after_seconds_overrides_schedule() {
        let policy = RetryPolicy::default();
        let delay = policy.delay_for(0, &rate_limited(Some("3")));
        assert!(delay >= Duration::from_millis(3000));
    }

    #[test]
    fn test_429_without_header_uses_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(3, &rate_limited(None)), Duration::from_secs(3));
        assert_eq!(
            policy.delay_for(2, &rate_limited(Some("soon"))),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_retry_after_ignored_for_other_statuses() {
        let policy = RetryPolicy::default();
        let mut err = ApiError::from_response(503, &HeaderMap::new(), b"");
        err.retry_after = Some("30".to_string());
        assert_eq!(policy.delay_for(0, &err), Duration::from_secs(1));
    }

    #[test]
    fn test_delays_are_capped() {
        let policy = RetryPolicy {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(
            policy.delay_for(0, &rate_limited(Some("18446744073709551615"))),
            Duration::from_secs(10)
        );
        assert_eq!(policy.backoff(10), Duration::from_secs(10));
        assert_eq!(
            RetryPolicy::default().delay_for(0, &rate_limited(Some("3600"))),
            DEFAULT_MAX_DELAY
        );
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let now = httpdate::parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:05 GMT", now),
            Some(Duration::from_secs(5))
        );
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:27:00 GMT", now),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_retry_after("later", now), None);
    }

    #[test]
    fn test_retry_state_bound() {
        let mut state = RetryState::new(DEFAULT_MAX_ATTEMPTS);
        let mut attempts = Vec::new();
        while state.can_retry() {
            attempts.push(state.advance());
        }
        assert_eq!(attempts, vec![0, 1, 2, 3, 4]);
        assert!(!state.can_retry());
    }
}
