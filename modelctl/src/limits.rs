//! Request quota enforcement for the public execution API.
//!
//! The public `describe`/`execute` surface is guarded by a per-source fixed
//! window quota (2 calls/minute by default). The counter is injected into
//! [`crate::AppState`] behind the [`RateCounter`] trait so tests can use the
//! in-process implementation and a clustered deployment can substitute a
//! shared counter.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::RateLimitConfig;

/// Counting service consulted by the access-gated API.
///
/// Semantics follow the gate in the facade: `too_many_attempts` is checked
/// before any work, and `hit` is recorded only once a request has passed the
/// credential gate - failed probes do not consume quota.
pub trait RateCounter: Send + Sync {
    /// Whether the source has already used up its window.
    fn too_many_attempts(&self, key: &str) -> bool;

    /// Record one consumed attempt for the source.
    fn hit(&self, key: &str);
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// In-process fixed-window counter keyed by source address.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    windows: DashMap<String, Window>,
    limit: u32,
    window: Duration,
}

impl FixedWindowLimiter {
    /// Creates a limiter from configuration.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            limit: config.requests_per_window,
            window: config.window,
        }
    }

    fn is_expired(&self, window: &Window) -> bool {
        window.started.elapsed() >= self.window
    }
}

impl RateCounter for FixedWindowLimiter {
    fn too_many_attempts(&self, key: &str) -> bool {
        match self.windows.get(key) {
            Some(window) if !self.is_expired(&window) => window.count >= self.limit,
            _ => false,
        }
    }

    fn hit(&self, key: &str) {
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: Instant::now(),
            count: 0,
        });
        if self.is_expired(&entry) {
            entry.started = Instant::now();
            entry.count = 1;
        } else {
            entry.count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_limiter(limit: u32, window_ms: u64) -> FixedWindowLimiter {
        FixedWindowLimiter::new(&RateLimitConfig {
            requests_per_window: limit,
            window: Duration::from_millis(window_ms),
        })
    }

    #[test]
    fn test_under_limit_allows() {
        let limiter = test_limiter(2, 60_000);
        assert!(!limiter.too_many_attempts("10.0.0.1"));
        limiter.hit("10.0.0.1");
        assert!(!limiter.too_many_attempts("10.0.0.1"));
    }

    #[test]
    fn test_limit_reached_rejects() {
        let limiter = test_limiter(2, 60_000);
        limiter.hit("10.0.0.1");
        limiter.hit("10.0.0.1");
        assert!(limiter.too_many_attempts("10.0.0.1"));
    }

    #[test]
    fn test_sources_are_independent() {
        let limiter = test_limiter(1, 60_000);
        limiter.hit("10.0.0.1");
        assert!(limiter.too_many_attempts("10.0.0.1"));
        assert!(!limiter.too_many_attempts("10.0.0.2"));
    }

    #[tokio::test]
    async fn test_window_expiry_resets_quota() {
        let limiter = test_limiter(1, 100);
        limiter.hit("10.0.0.1");
        assert!(limiter.too_many_attempts("10.0.0.1"));

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(!limiter.too_many_attempts("10.0.0.1"));
        limiter.hit("10.0.0.1");
        assert!(limiter.too_many_attempts("10.0.0.1"));
    }

    #[test]
    fn test_checks_do_not_consume_quota() {
        let limiter = test_limiter(1, 60_000);
        for _ in 0..10 {
            assert!(!limiter.too_many_attempts("10.0.0.1"));
        }
        limiter.hit("10.0.0.1");
        assert!(limiter.too_many_attempts("10.0.0.1"));
    }
}
