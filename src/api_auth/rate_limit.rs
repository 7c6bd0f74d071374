//! Per-key sliding-window rate limiter.
//!
//! Keeps request timestamps per key in a DashMap; each check prunes entries
//! older than the window, then admits the request if the count is under the
//! cap. Memory is bounded by `max_requests` per active key.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub window: Duration,
    pub max_requests: usize,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 120,
        }
    }
}

pub struct RateLimiter {
    config: RateLimiterConfig,
    hits: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            hits: DashMap::new(),
        }
    }

    /// Admit or reject one request for `key`, recording it if admitted.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut entry = self.hits.entry(key.to_string()).or_default();
        while let Some(front) = entry.front() {
            if now.duration_since(*front) > self.config.window {
                entry.pop_front();
            } else {
                break;
            }
        }
        if entry.len() >= self.config.max_requests {
            return false;
        }
        entry.push_back(now);
        true
    }
}
