//! Per-client token bucket guarding the RAG endpoint.
//!
//! One bucket per caller key (client IP), refilled continuously: a full
//! window restores the full capacity, a fraction of a window restores the
//! floor of the proportional share. The map is process-wide and never
//! pruned; buckets are created lazily on first sight of a key.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: i64,
    stamp: Instant,
}

pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    capacity: i64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            capacity: i64::from(capacity),
            window,
        }
    }

    /// Returns `true` and consumes one token if `key` has quota left.
    ///
    /// A rejected call consumes nothing. The read-modify-write runs under
    /// the map lock, so two concurrent requests for the same key cannot
    /// both observe the same stale bucket.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.capacity,
            stamp: now,
        });

        let elapsed = now.saturating_duration_since(bucket.stamp);
        let refill = if self.window.is_zero() {
            self.capacity
        } else {
            // floor(elapsed / window * capacity), in integer arithmetic
            (elapsed.as_millis() * self.capacity as u128 / self.window.as_millis()) as i64
        };
        let tokens = (bucket.tokens + refill).min(self.capacity);
        bucket.stamp = now;

        if tokens <= 0 {
            bucket.tokens = tokens;
            false
        } else {
            bucket.tokens = tokens - 1;
            true
        }
    }

    #[cfg(test)]
    fn tokens_for(&self, key: &str) -> Option<i64> {
        self.buckets.lock().get(key).map(|b| b.tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn fresh_key_allows_exactly_capacity_calls() {
        let limiter = RateLimiter::new(10, WINDOW);
        let now = Instant::now();
        for _ in 0..10 {
            assert!(limiter.allow_at("1.2.3.4", now));
        }
        assert!(!limiter.allow_at("1.2.3.4", now));
        assert!(!limiter.allow_at("1.2.3.4", now));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(1, WINDOW);
        let now = Instant::now();
        assert!(limiter.allow_at("a", now));
        assert!(!limiter.allow_at("a", now));
        assert!(limiter.allow_at("b", now));
    }

    #[test]
    fn full_window_restores_full_capacity() {
        let limiter = RateLimiter::new(10, WINDOW);
        let start = Instant::now();
        for _ in 0..10 {
            assert!(limiter.allow_at("ip", start));
        }
        assert!(!limiter.allow_at("ip", start));

        let later = start + WINDOW;
        for _ in 0..10 {
            assert!(limiter.allow_at("ip", later));
        }
        assert!(!limiter.allow_at("ip", later));
    }

    #[test]
    fn refill_clamps_at_capacity_after_long_idle() {
        let limiter = RateLimiter::new(10, WINDOW);
        let start = Instant::now();
        assert!(limiter.allow_at("ip", start));

        // A week of silence does not bank more than one window's worth.
        let much_later = start + WINDOW * 10_000;
        assert!(limiter.allow_at("ip", much_later));
        assert_eq!(limiter.tokens_for("ip"), Some(9));
    }

    #[test]
    fn partial_window_refills_proportionally_floored() {
        let limiter = RateLimiter::new(10, WINDOW);
        let start = Instant::now();
        for _ in 0..10 {
            assert!(limiter.allow_at("ip", start));
        }

        // 5.9s of a 60s window at capacity 10 floors to zero refill.
        assert!(!limiter.allow_at("ip", start + Duration::from_millis(5_900)));
        // A further full tenth of the window refills exactly one token.
        assert!(limiter.allow_at("ip", start + Duration::from_millis(11_900)));
        assert!(!limiter.allow_at("ip", start + Duration::from_millis(11_900)));
    }

    #[test]
    fn tokens_never_increase_within_a_window_absent_refill() {
        let limiter = RateLimiter::new(5, WINDOW);
        let now = Instant::now();
        let mut previous = i64::from(u32::MAX);
        for _ in 0..5 {
            limiter.allow_at("ip", now);
            let tokens = limiter.tokens_for("ip").unwrap();
            assert!(tokens < previous);
            previous = tokens;
        }
    }

    #[test]
    fn zero_capacity_rejects_everything() {
        let limiter = RateLimiter::new(0, WINDOW);
        let now = Instant::now();
        assert!(!limiter.allow_at("ip", now));
        assert!(!limiter.allow_at("ip", now + WINDOW * 5));
    }

    #[test]
    fn rejection_consumes_no_quota() {
        let limiter = RateLimiter::new(2, WINDOW);
        let now = Instant::now();
        assert!(limiter.allow_at("ip", now));
        assert!(limiter.allow_at("ip", now));
        for _ in 0..20 {
            assert!(!limiter.allow_at("ip", now));
        }
        assert_eq!(limiter.tokens_for("ip"), Some(0));
    }
}
