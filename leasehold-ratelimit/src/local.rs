//! Process-local fixed-window rate limiting

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::{RateLimitConfig, RateLimitResult, RateLimiter};

/// Window state for a key
#[derive(Debug)]
struct Window {
    count: Arc<AtomicU64>,
    expires_at: Instant,
}

/// Map size below which opening a window never triggers a sweep
const MIN_SWEEP_AT: usize = 1024;

#[derive(Debug)]
struct Windows {
    by_key: HashMap<String, Window>,
    // Sweep expired windows once the map grows to this size
    sweep_at: usize,
}

impl Windows {
    fn sweep(&mut self, now: Instant) {
        let before = self.by_key.len();
        self.by_key.retain(|_, window| window.expires_at > now);
        self.sweep_at = (self.by_key.len() * 2).max(MIN_SWEEP_AT);
        debug!(
            purged = before - self.by_key.len(),
            key_count = self.by_key.len(),
            "Purged expired rate limit windows"
        );
    }
}

/// Fixed-window rate limiter kept in process memory.
///
/// Window transitions happen under a mutex; the per-key counter is an atomic
/// incremented after the mutex is released, so requests racing a window reset
/// may land in either window.
///
/// Expired windows are swept when a new key would grow the map past twice the
/// number of keys that survived the previous sweep, so memory follows the
/// number of recently active keys.
pub struct LocalRateLimiter {
    max_requests: u64,
    interval: Duration,
    windows: Mutex<Windows>,
}

impl LocalRateLimiter {
    /// Create a new local limiter
    pub fn new(config: RateLimitConfig) -> RateLimitResult<Self> {
        config.validate()?;
        Ok(Self {
            max_requests: config.max_requests,
            interval: config.interval,
            windows: Mutex::new(Windows {
                by_key: HashMap::new(),
                sweep_at: MIN_SWEEP_AT,
            }),
        })
    }

    /// Requests admitted per window
    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    /// Window length
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of keys being tracked
    pub fn key_count(&self) -> usize {
        self.windows.lock().by_key.len()
    }

    /// Forget keys whose window has ended
    pub fn purge_expired(&self) {
        self.windows.lock().sweep(Instant::now());
    }
}

#[async_trait]
impl RateLimiter for LocalRateLimiter {
    async fn can_pass(&self, key: &str) -> RateLimitResult<bool> {
        let now = Instant::now();

        let count = {
            let mut windows = self.windows.lock();
            match windows.by_key.get_mut(key) {
                Some(window) => {
                    if now >= window.expires_at {
                        window.count.store(0, Ordering::SeqCst);
                        window.expires_at = now + self.interval;
                    }
                    window.count.clone()
                }
                None => {
                    if windows.by_key.len() >= windows.sweep_at {
                        windows.sweep(now);
                    }
                    windows.by_key.insert(
                        key.to_string(),
                        Window {
                            count: Arc::new(AtomicU64::new(1)),
                            expires_at: now + self.interval,
                        },
                    );
                    trace!(key = %key, "Opened rate limit window");
                    return Ok(true);
                }
            }
        };

        let count = count.fetch_add(1, Ordering::SeqCst) + 1;
        let allowed = count <= self.max_requests;
        trace!(key = %key, count = count, allowed = allowed, "Local rate limit check");
        Ok(allowed)
    }
}

impl std::fmt::Debug for LocalRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRateLimiter")
            .field("max_requests", &self.max_requests)
            .field("interval", &self.interval)
            .field("key_count", &self.key_count())
            .finish()
    }
}
