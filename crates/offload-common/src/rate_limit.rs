//! Token-bucket rate limiter for log messages.
//!
//! Backend failures can repeat thousands of times per second under churn.
//! Callers ask the limiter before logging; suppressed messages are counted
//! and the count is handed to the next admitted message.

use parking_lot::Mutex;
use std::time::Instant;

/// Default messages admitted per second.
pub const DEFAULT_RATE_PER_SEC: u32 = 5;

/// Default burst size.
pub const DEFAULT_BURST: u32 = 20;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    suppressed: u64,
}

/// A thread-safe token bucket.
///
/// ```
/// use offload_common::RateLimiter;
///
/// let limiter = RateLimiter::new(1, 2);
/// assert_eq!(limiter.check(), Some(0));
/// assert_eq!(limiter.check(), Some(0));
/// assert_eq!(limiter.check(), None);
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    rate_per_sec: u32,
    burst: u32,
    bucket: Mutex<Bucket>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_PER_SEC, DEFAULT_BURST)
    }
}

impl RateLimiter {
    /// Creates a full bucket. A zero `burst` is treated as 1.
    pub fn new(rate_per_sec: u32, burst: u32) -> Self {
        let burst = burst.max(1);
        Self {
            rate_per_sec,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(burst),
                last_refill: Instant::now(),
                suppressed: 0,
            }),
        }
    }

    /// Consumes a token if one is available.
    ///
    /// Returns `Some(n)` when the message may be logged, where `n` is the
    /// number of messages suppressed since the last admitted one, or `None`
    /// when the message should be dropped.
    pub fn check(&self) -> Option<u64> {
        self.check_at(Instant::now())
    }

    fn check_at(&self, now: Instant) -> Option<u64> {
        let mut bucket = self.bucket.lock();

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let refill = elapsed.as_secs_f64() * f64::from(self.rate_per_sec);
        bucket.tokens = (bucket.tokens + refill).min(f64::from(self.burst));
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Some(std::mem::take(&mut bucket.suppressed))
        } else {
            bucket.suppressed += 1;
            None
        }
    }

    pub fn rate_per_sec(&self) -> u32 {
        self.rate_per_sec
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_burst_then_suppress() {
        let limiter = RateLimiter::new(5, 3);
        let t0 = Instant::now();

        assert_eq!(limiter.check_at(t0), Some(0));
        assert_eq!(limiter.check_at(t0), Some(0));
        assert_eq!(limiter.check_at(t0), Some(0));
        assert_eq!(limiter.check_at(t0), None);
        assert_eq!(limiter.check_at(t0), None);
    }

    #[test]
    fn test_refill_reports_suppressed() {
        let limiter = RateLimiter::new(10, 1);
        let t0 = Instant::now();

        assert_eq!(limiter.check_at(t0), Some(0));
        assert_eq!(limiter.check_at(t0), None);
        assert_eq!(limiter.check_at(t0), None);

        // 10/s refills one token in 100ms.
        let t1 = t0 + Duration::from_millis(150);
        assert_eq!(limiter.check_at(t1), Some(2));
        assert_eq!(limiter.check_at(t1), None);
    }

    #[test]
    fn test_zero_burst_admits_one() {
        let limiter = RateLimiter::new(0, 0);
        assert_eq!(limiter.burst(), 1);
        assert!(limiter.check().is_some());
        assert!(limiter.check().is_none());
    }
}
