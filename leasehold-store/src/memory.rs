//! In-memory coordination store
//!
//! Uses DashMap for thread-safe concurrent access. TTLs are measured on the
//! tokio clock, so tests running with a paused clock can fast-forward expiry.
//! Suitable for single-instance deployments or testing. For distributed
//! deployments, use the Redis store.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::{CoordinationStore, Result, StoreError};

#[derive(Debug, Clone)]
struct Slot {
    value: String,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(value: impl Into<String>, ttl: Option<Duration>, now: Instant) -> Self {
        Self {
            value: value.into(),
            expires_at: ttl.map(|ttl| now + ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory coordination store
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: DashMap<String, Slot>,
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        debug!("Creating new in-memory coordination store");
        Self {
            slots: DashMap::new(),
        }
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.slots.iter().filter(|slot| !slot.is_expired(now)).count()
    }

    /// Whether the store holds no live keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining TTL of a key, `None` if the key is absent or has no TTL
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.slots
            .get(key)
            .filter(|slot| !slot.is_expired(now))
            .and_then(|slot| slot.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Drop expired keys
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.slots.retain(|_, slot| !slot.is_expired(now));
        debug!(key_count = self.slots.len(), "Purged expired keys");
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let inserted = match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(Slot::new(value, Some(ttl), now));
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot::new(value, Some(ttl), now));
                true
            }
        };
        trace!(key = %key, inserted = inserted, "Memory SET NX");
        Ok(inserted)
    }

    async fn del(&self, key: &str) -> Result<u64> {
        let now = Instant::now();
        match self.slots.remove(key) {
            Some((_, slot)) if !slot.is_expired(now) => Ok(1),
            _ => Ok(0),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(occupied) if occupied.get().is_expired(now) => {
                occupied.remove();
                Ok(false)
            }
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().expires_at = Some(now + ttl);
                Ok(true)
            }
            Entry::Vacant(_) => Ok(false),
        }
    }

    async fn incr_with_expiry(&self, key: &str, window: Duration) -> Result<i64> {
        let now = Instant::now();
        let mut slot = self
            .slots
            .entry(key.to_string())
            .or_insert_with(|| Slot::new("0", None, now));

        if slot.is_expired(now) {
            *slot = Slot::new("0", None, now);
        }

        let count = slot
            .value
            .parse::<i64>()
            .map_err(|_| StoreError::command("value is not an integer or out of range"))?
            + 1;
        slot.value = count.to_string();

        if count == 1 {
            slot.expires_at = Some(now + window);
        }

        Ok(count)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "memory"
    }
}
