//! Fixed-window rate limiting keyed by `(operation, identity)`.
//!
//! The in-memory limiter is process-local, so under horizontal scaling each
//! replica counts separately. That is acceptable for abuse mitigation; swap in
//! a shared-store implementation of `RateLimiter` for anything stricter.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rate limit exceeded for {operation}; retry after {retry_after_secs}s")]
pub struct RateLimitExceeded {
    pub operation: String,
    pub retry_after_secs: u64,
}

/// A counter service. Records one event and fails closed once `max` events
/// have been seen in the current `window`.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(
        &self,
        operation: &str,
        identity: &str,
        max: u64,
        window: Duration,
    ) -> Result<(), RateLimitExceeded>;
}

#[derive(Debug, Clone)]
struct WindowEntry {
    count: u64,
    window_start: Instant,
}

/// In-memory fixed-window limiter. Thread-safe via `Mutex<HashMap>`.
#[derive(Default)]
pub struct InMemoryRateLimiter {
    store: Mutex<HashMap<(String, String), WindowEntry>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_at(
        &self,
        operation: &str,
        identity: &str,
        max: u64,
        window: Duration,
        now: Instant,
    ) -> Result<(), RateLimitExceeded> {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let key = (operation.to_string(), identity.to_string());

        let entry = store.entry(key).or_insert(WindowEntry {
            count: 0,
            window_start: now,
        });

        let elapsed = now.duration_since(entry.window_start);
        if elapsed >= window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= max {
            let remaining = window.saturating_sub(now.duration_since(entry.window_start));
            return Err(RateLimitExceeded {
                operation: operation.to_string(),
                retry_after_secs: remaining.as_secs() + 1,
            });
        }

        entry.count += 1;
        Ok(())
    }

    /// Drops entries whose window closed more than `window` ago.
    pub fn cleanup(&self, window: Duration) {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        store.retain(|_, entry| now.duration_since(entry.window_start) < window * 2);
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(
        &self,
        operation: &str,
        identity: &str,
        max: u64,
        window: Duration,
    ) -> Result<(), RateLimitExceeded> {
        self.check_at(operation, identity, max, window, Instant::now())
    }
}
