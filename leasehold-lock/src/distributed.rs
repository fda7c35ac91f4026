//! Store-backed distributed locks

use async_trait::async_trait;
use leasehold_store::{HealthMonitor, bounded};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::renewal::{Lease, RenewalScheduler};
use crate::{Lock, LockConfig, LockEntry, LockError, LockResult};

/// Distributed lock on a shared coordination store.
///
/// Acquisition is a `SET NX` with the configured TTL; held locks are renewed
/// at half-life by a [`RenewalScheduler`] until released. All store calls go
/// through the [`HealthMonitor`]: they fail fast while the store is known to
/// be down, and failures are reported back to it.
pub struct DistributedLock {
    health: HealthMonitor,
    config: LockConfig,
    owner: String,
    scheduler: RenewalScheduler,
}

impl DistributedLock {
    /// Create a new distributed lock
    ///
    /// Fails with [`LockError::InvalidConfig`] when the TTL is zero. Must be
    /// called from within a tokio runtime (the renewal tasks are spawned
    /// here).
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use leasehold_lock::{DistributedLock, LockConfig};
    /// use leasehold_store::{HealthConfig, HealthMonitor, RedisConfig, RedisStore};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let store = Arc::new(RedisStore::new(RedisConfig::default()).await?);
    /// let health = HealthMonitor::new(store, HealthConfig::default());
    /// let lock = DistributedLock::new(health, LockConfig::new(Duration::from_secs(30)))?;
    /// ```
    pub fn new(health: HealthMonitor, config: LockConfig) -> LockResult<Self> {
        config.validate()?;

        let scheduler = RenewalScheduler::spawn(health.clone(), &config);
        Ok(Self {
            health,
            config,
            owner: Uuid::new_v4().to_string(),
            scheduler,
        })
    }

    /// Lease TTL
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Value written to every key this instance locks
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The health monitor this lock reports to
    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// Leases queued for renewal
    pub fn pending_renewals(&self) -> usize {
        self.scheduler.pending()
    }
}

#[async_trait]
impl Lock for DistributedLock {
    async fn try_lock(&self, key: &str) -> LockResult<Option<LockEntry>> {
        if key.is_empty() {
            return Err(LockError::EmptyKey);
        }

        if !self.health.is_ok() {
            return Err(self.health.unavailable().into());
        }

        let store = self.health.store();
        let acquired = bounded(
            self.config.op_timeout,
            store.set_nx(key, &self.owner, self.config.ttl),
        )
        .await;

        match acquired {
            Ok(true) => {
                let lease = Lease::new(key, Instant::now() + self.config.renew_after());
                self.scheduler.submit(lease.clone()).await;
                info!(key = %key, "Acquired lock");
                Ok(Some(LockEntry::leased(lease)))
            }
            Ok(false) => {
                debug!(key = %key, "Failed to acquire lock (already held)");
                Ok(None)
            }
            Err(e) => {
                self.health.occur_err(&e);
                warn!(key = %key, error = %e, "Lock acquisition failed");
                Err(e.into())
            }
        }
    }

    async fn unlock(&self, entry: LockEntry) -> LockResult<()> {
        entry.cancel_lease();

        if !self.health.is_ok() {
            warn!(key = %entry.key(), "Store unhealthy, lock left to expire");
            return Err(self.health.unavailable().into());
        }

        let store = self.health.store();
        match bounded(self.config.op_timeout, store.del(entry.key())).await {
            Ok(deleted) => {
                debug!(key = %entry.key(), deleted = deleted, "Released lock");
                Ok(())
            }
            Err(e) => {
                self.health.occur_err(&e);
                warn!(key = %entry.key(), error = %e, "Failed to release lock, it will expire");
                Err(e.into())
            }
        }
    }
}

impl std::fmt::Debug for DistributedLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedLock")
            .field("ttl", &self.config.ttl)
            .field("owner", &self.owner)
            .field("health", &self.health)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leasehold_store::testing::FlakyStore;
    use leasehold_store::{CoordinationStore, HealthConfig, StoreError};
    use std::sync::Arc;

    fn setup(ttl: Duration) -> (Arc<FlakyStore>, DistributedLock) {
        let store = Arc::new(FlakyStore::memory());
        let health = HealthMonitor::new(store.clone(), HealthConfig::default());
        let lock = DistributedLock::new(health, LockConfig::new(ttl)).unwrap();
        (store, lock)
    }

    #[tokio::test]
    async fn test_zero_ttl_is_fatal() {
        let store = Arc::new(FlakyStore::memory());
        let health = HealthMonitor::new(store, HealthConfig::default());

        let result = DistributedLock::new(health, LockConfig::new(Duration::ZERO));
        assert!(matches!(result, Err(LockError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_contention_is_not_an_error() {
        let (_store, lock) = setup(Duration::from_secs(10));

        let entry = lock.try_lock("test").await.unwrap().expect("acquire");

        let other = lock.try_lock("test1").await.unwrap().expect("different key");
        lock.unlock(other).await.unwrap();

        assert!(lock.try_lock("test").await.unwrap().is_none());

        lock.unlock(entry).await.unwrap();
        assert!(lock.try_lock("test").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_owner_written_to_store() {
        let (store, lock) = setup(Duration::from_secs(10));
        lock.try_lock("owned").await.unwrap().unwrap();

        // Another owner cannot overwrite it
        assert!(!store.set_nx("owned", "intruder", Duration::from_secs(10)).await.unwrap());
        assert!(!lock.owner().is_empty());
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let (store, lock) = setup(Duration::from_secs(10));
        assert!(matches!(lock.try_lock("").await, Err(LockError::EmptyKey)));
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_renewed_while_held() {
        let (_store, lock) = setup(Duration::from_secs(10));

        let entry = lock.try_lock("test").await.unwrap().expect("acquire");
        tokio::time::sleep(Duration::from_secs(15)).await;

        assert!(lock.try_lock("test").await.unwrap().is_none(), "lease was not renewed");

        lock.unlock(entry).await.unwrap();
        assert!(lock.try_lock("test").await.unwrap().is_some(), "unlock did not release");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlocked_lease_stops_renewing() {
        let (store, lock) = setup(Duration::from_secs(10));

        let entry = lock.try_lock("job").await.unwrap().unwrap();
        let lease = entry.lease().cloned().unwrap();
        lock.unlock(entry).await.unwrap();
        assert!(lease.is_done());

        let calls = store.call_count();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.call_count(), calls);
        assert_eq!(lock.pending_renewals(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_reported_then_fast_fail() {
        let (store, lock) = setup(Duration::from_secs(10));
        store.fail();

        let err = lock.try_lock("test").await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(!lock.health().is_ok());

        // No round-trip while unhealthy
        let calls = store.call_count();
        let err = lock.try_lock("test").await.unwrap_err();
        assert!(matches!(err, LockError::Store(StoreError::Unavailable(_))));
        assert_eq!(store.call_count(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_outage() {
        let (store, lock) = setup(Duration::from_secs(10));
        store.fail();
        assert!(lock.try_lock("test").await.is_err());

        store.recover();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(lock.health().is_ok());
        assert!(lock.try_lock("test").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unlock_while_unhealthy_returns_error() {
        let (store, lock) = setup(Duration::from_secs(10));
        let entry = lock.try_lock("test").await.unwrap().unwrap();
        let lease = entry.lease().cloned().unwrap();

        store.fail();
        lock.health().occur_err(&StoreError::Timeout);

        assert!(lock.unlock(entry).await.is_err());
        assert!(lease.is_done());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_holder_across_instances() {
        let store: Arc<dyn CoordinationStore> = Arc::new(FlakyStore::memory());

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let health = HealthMonitor::new(store.clone(), HealthConfig::default());
                tokio::spawn(async move {
                    let lock = DistributedLock::new(health, LockConfig::new(Duration::from_secs(10)))
                        .unwrap();
                    lock.try_lock("shared").await.unwrap().is_some()
                })
            })
            .collect();

        let mut holders = 0;
        for handle in handles {
            if handle.await.unwrap() {
                holders += 1;
            }
        }
        assert_eq!(holders, 1);
    }
}
