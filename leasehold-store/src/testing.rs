//! Fault injection for tests.
//!
//! [`FlakyStore`] wraps another store and fails every operation while it is
//! switched into outage mode, which is how the lock and rate limiter tests
//! simulate an unreachable Redis.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::{CoordinationStore, MemoryStore, Result, StoreError};

type PingHook = Box<dyn Fn() + Send + Sync>;

/// Store wrapper with a switchable outage.
pub struct FlakyStore<S = MemoryStore> {
    inner: S,
    failing: AtomicBool,
    pings: AtomicU64,
    calls: AtomicU64,
    on_ping: Mutex<Option<PingHook>>,
}

impl FlakyStore<MemoryStore> {
    /// Healthy wrapper around a fresh in-memory store.
    pub fn memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

impl<S: CoordinationStore> FlakyStore<S> {
    /// Wrap a store; starts healthy.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
            pings: AtomicU64::new(0),
            calls: AtomicU64::new(0),
            on_ping: Mutex::new(None),
        }
    }

    /// Run `hook` after every successful ping, before the answer is returned.
    pub fn on_ping(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_ping.lock() = Some(Box::new(hook));
    }

    /// Remove the ping hook.
    pub fn clear_on_ping(&self) {
        *self.on_ping.lock() = None;
    }

    /// Start failing every operation.
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Stop failing.
    pub fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    /// Whether the outage is active.
    pub fn is_failing(&self) -> bool {
        self.failing.load(Ordering::SeqCst)
    }

    /// Number of pings received.
    pub fn ping_count(&self) -> u64 {
        self.pings.load(Ordering::SeqCst)
    }

    /// Number of non-ping operations received.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(&self) -> Result<()> {
        if self.is_failing() {
            Err(StoreError::unavailable("connection refused"))
        } else {
            Ok(())
        }
    }

    fn call(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check()
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for FlakyStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlakyStore")
            .field("inner", &self.inner)
            .field("failing", &self.failing)
            .field("pings", &self.pings)
            .field("calls", &self.calls)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S: CoordinationStore> CoordinationStore for FlakyStore<S> {
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        self.call()?;
        self.inner.set_nx(key, value, ttl).await
    }

    async fn del(&self, key: &str) -> Result<u64> {
        self.call()?;
        self.inner.del(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.call()?;
        self.inner.expire(key, ttl).await
    }

    async fn incr_with_expiry(&self, key: &str, window: Duration) -> Result<i64> {
        self.call()?;
        self.inner.incr_with_expiry(key, window).await
    }

    async fn ping(&self) -> Result<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.ping().await?;
        if let Some(hook) = self.on_ping.lock().as_ref() {
            hook();
        }
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        self.inner.store_type()
    }
}
