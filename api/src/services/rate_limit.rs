//! Per-user rate limiting for content writes
//!
//! Uses a simple token bucket algorithm with in-memory storage.
//! Tokens are stored per user_id and refill over time.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Rate limiter configuration
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Maximum tokens (burst capacity)
    pub max_tokens: u32,
    /// Tokens added per second
    pub refill_rate: f64,
}

impl RateLimitConfig {
    /// Posts and comments: burst of 30, then one per second
    pub const CONTENT: Self = Self {
        max_tokens: 30,
        refill_rate: 1.0,
    };
}

#[derive(Debug)]
struct UserBucket {
    tokens: f64,
    last_update: Instant,
}

/// Per-user rate limiter using token bucket algorithm
#[derive(Debug)]
pub struct UserRateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<HashMap<i64, UserBucket>>,
}

impl UserRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Check if a request is allowed for the given user_id.
    /// Returns true if allowed, false if rate limited.
    pub fn check(&self, user_id: i64) -> bool {
        self.check_at(user_id, Instant::now())
    }

    fn check_at(&self, user_id: i64, now: Instant) -> bool {
        // A poisoned map only holds counters; keep serving with it
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());

        let bucket = buckets.entry(user_id).or_insert_with(|| UserBucket {
            tokens: self.config.max_tokens as f64,
            last_update: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_update);
        let refill = elapsed.as_secs_f64() * self.config.refill_rate;
        bucket.tokens = (bucket.tokens + refill).min(self.config.max_tokens as f64);
        bucket.last_update = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop buckets idle for longer than `max_age`
    pub fn cleanup(&self, max_age: Duration) {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_update) < max_age);
    }

    pub fn tracked_users(&self) -> usize {
        self.buckets.lock().map(|b| b.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_tokens: u32) -> UserRateLimiter {
        UserRateLimiter::new(RateLimitConfig {
            max_tokens,
            refill_rate: 1.0,
        })
    }

    #[test]
    fn burst_then_reject() {
        let limiter = limiter(3);
        let now = Instant::now();
        assert!(limiter.check_at(1, now));
        assert!(limiter.check_at(1, now));
        assert!(limiter.check_at(1, now));
        assert!(!limiter.check_at(1, now));
    }

    #[test]
    fn buckets_are_per_user() {
        let limiter = limiter(1);
        let now = Instant::now();
        assert!(limiter.check_at(1, now));
        assert!(!limiter.check_at(1, now));
        assert!(limiter.check_at(2, now));
    }

    #[test]
    fn refills_over_time() {
        let limiter = limiter(1);
        let now = Instant::now();
        assert!(limiter.check_at(1, now));
        assert!(!limiter.check_at(1, now));
        assert!(limiter.check_at(1, now + Duration::from_millis(1100)));
    }

    #[test]
    fn cleanup_drops_idle_buckets() {
        let limiter = limiter(1);
        limiter.check(1);
        assert_eq!(limiter.tracked_users(), 1);
        limiter.cleanup(Duration::ZERO);
        assert_eq!(limiter.tracked_users(), 0);
    }
}
