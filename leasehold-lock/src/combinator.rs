//! Distributed lock with local fallback

use async_trait::async_trait;
use leasehold_store::{HealthMonitor, bounded};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{DistributedLock, LocalLock, Lock, LockConfig, LockEntry, LockResult};

/// Lock that prefers the shared store and degrades to process-local exclusion
/// while the store is unreachable.
///
/// Local fallback keeps callers available during an outage at the price of
/// cross-process exclusion: two processes may both hold a key while the store
/// is down.
pub struct CombinatorLock {
    distributed: DistributedLock,
    local: LocalLock,
    health: HealthMonitor,
    op_timeout: Duration,
}

impl CombinatorLock {
    /// Create a combinator over a new distributed lock and a new local lock
    pub fn new(health: HealthMonitor, config: LockConfig) -> LockResult<Self> {
        let op_timeout = config.op_timeout;
        let distributed = DistributedLock::new(health.clone(), config)?;
        Ok(Self {
            distributed,
            local: LocalLock::new(),
            health,
            op_timeout,
        })
    }

    /// The store-backed half
    pub fn distributed(&self) -> &DistributedLock {
        &self.distributed
    }

    /// The process-local half
    pub fn local(&self) -> &LocalLock {
        &self.local
    }
}

#[async_trait]
impl Lock for CombinatorLock {
    async fn try_lock(&self, key: &str) -> LockResult<Option<LockEntry>> {
        match self.distributed.try_lock(key).await {
            Err(e) if e.is_store_error() => {
                warn!(key = %key, error = %e, "Store lock unavailable, falling back to local lock");
                self.local.try_lock(key).await
            }
            other => other,
        }
    }

    async fn unlock(&self, entry: LockEntry) -> LockResult<()> {
        entry.cancel_lease();

        // Fallback entries always own their local key, whatever the store holds now
        let mut release_local = true;
        if self.health.is_ok() {
            let store = self.health.store();
            match bounded(self.op_timeout, store.del(entry.key())).await {
                Ok(deleted) if deleted > 0 => release_local = entry.is_local(),
                Ok(_) => {}
                Err(e) => {
                    self.health.occur_err(&e);
                    warn!(key = %entry.key(), error = %e, "Failed to delete lock key");
                }
            }
        }

        if release_local {
            let released = self.local.release(entry.key());
            debug!(key = %entry.key(), released = released, "Released local lock");
        }

        Ok(())
    }
}
