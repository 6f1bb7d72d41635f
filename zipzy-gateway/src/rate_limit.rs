//! Fixed-window rate limiting keyed by client IP.
//!
//! The table is bounded: once `capacity` distinct clients are tracked, the
//! least recently seen one is evicted. A background sweep additionally drops
//! entries whose window expired long ago.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use zipzy_common::config::RateLimitConfig;

/// Admission check used by the proxy pipeline.
///
/// Implementations must make the compare-and-update step atomic per key.
pub trait RateLimitStore: Send + Sync {
    /// Returns `true` when the request identified by `key` may proceed.
    fn check(&self, key: &str) -> bool;
}

/// Per-client counter for the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub window_start: Instant,
    pub count: u32,
}

/// In-memory fixed-window limiter.
pub struct FixedWindowLimiter {
    max_requests: u32,
    window: Duration,
    entries: Mutex<LruCache<String, RateLimitEntry>>,
}

impl FixedWindowLimiter {
    /// Create a limiter. A zero `capacity` is bumped to 1.
    pub fn new(max_requests: u32, window: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            max_requests,
            window,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window(), config.capacity)
    }

    /// Decide admission for `key` at `now`.
    ///
    /// The whole lookup/compare/update runs under one lock.
    pub fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(entry) = entries.get_mut(key) {
            if now.saturating_duration_since(entry.window_start) > self.window {
                *entry = RateLimitEntry {
                    window_start: now,
                    count: 1,
                };
                return true;
            }
            if entry.count >= self.max_requests {
                return false;
            }
            entry.count += 1;
            return true;
        }

        if self.max_requests == 0 {
            return false;
        }

        let fresh = RateLimitEntry {
            window_start: now,
            count: 1,
        };
        if let Some((evicted, _)) = entries.push(key.to_string(), fresh) {
            tracing::debug!(evicted = %evicted, "Rate limit table full, evicted oldest client");
        }
        true
    }

    /// Current entry for `key`, without touching its recency.
    pub fn entry(&self, key: &str) -> Option<RateLimitEntry> {
        let entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.peek(key).copied()
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries whose window ended more than one full window before `now`.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let horizon = self.window.saturating_mul(2);
        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, e)| now.saturating_duration_since(e.window_start) > horizon)
            .map(|(k, _)| k.clone())
            .collect();

        for key in &stale {
            entries.pop(key);
        }
        stale.len()
    }
}

impl RateLimitStore for FixedWindowLimiter {
    fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }
}

/// Run [`FixedWindowLimiter::sweep`] every `interval` for the life of the runtime.
pub fn spawn_sweeper(
    limiter: Arc<FixedWindowLimiter>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = limiter.sweep(Instant::now());
            if removed > 0 {
                tracing::debug!(removed, remaining = limiter.len(), "Swept stale rate limit entries");
            }
        }
    })
}
