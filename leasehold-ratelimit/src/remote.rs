//! Store-backed fixed-window rate limiting
//!
//! Every process sharing the store shares the same counters. The counter for a
//! key is created by the first request of a window, which also sets its expiry;
//! the window ends when the store drops the key. A client can therefore send up
//! to twice the limit across a window boundary.

use async_trait::async_trait;
use leasehold_store::{HealthMonitor, bounded};
use tracing::{debug, warn};

use crate::{RateLimitConfig, RateLimitResult, RateLimiter};

/// Fixed-window rate limiter shared through a coordination store
pub struct RemoteRateLimiter {
    health: HealthMonitor,
    config: RateLimitConfig,
}

impl RemoteRateLimiter {
    /// Create a new remote limiter
    pub fn new(health: HealthMonitor, config: RateLimitConfig) -> RateLimitResult<Self> {
        config.validate()?;
        Ok(Self { health, config })
    }

    /// Limiter configuration
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// The health monitor this limiter reports to
    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }
}

#[async_trait]
impl RateLimiter for RemoteRateLimiter {
    async fn can_pass(&self, key: &str) -> RateLimitResult<bool> {
        if !self.health.is_ok() {
            return Err(self.health.unavailable().into());
        }

        let store_key = self.config.store_key(key);
        let store = self.health.store();
        let count = match bounded(
            self.config.op_timeout,
            store.incr_with_expiry(&store_key, self.config.interval),
        )
        .await
        {
            Ok(count) => count,
            Err(e) => {
                self.health.occur_err(&e);
                warn!(key = %key, error = %e, "Rate limit check failed");
                return Err(e.into());
            }
        };

        let allowed = u64::try_from(count).is_ok_and(|count| count <= self.config.max_requests);
        debug!(
            key = %key,
            count = count,
            limit = self.config.max_requests,
            allowed = allowed,
            "Rate limit check"
        );
        Ok(allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leasehold_store::testing::FlakyStore;
    use leasehold_store::{HealthConfig, StoreError};
    use std::sync::Arc;
    use std::time::Duration;

    fn setup(max: u64, interval: Duration) -> (Arc<FlakyStore>, RemoteRateLimiter) {
        let store = Arc::new(FlakyStore::memory());
        let health = HealthMonitor::new(store.clone(), HealthConfig::default());
        let limiter = RemoteRateLimiter::new(health, RateLimitConfig::new(max, interval)).unwrap();
        (store, limiter)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_window() {
        let (_store, limiter) = setup(10, Duration::from_secs(60));

        for i in 0..10 {
            assert!(limiter.can_pass("user").await.unwrap(), "request {} denied", i);
        }
        assert!(!limiter.can_pass("user").await.unwrap());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(limiter.can_pass("user").await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (_store, limiter) = setup(1, Duration::from_secs(60));

        assert!(limiter.can_pass("a").await.unwrap());
        assert!(!limiter.can_pass("a").await.unwrap());
        assert!(limiter.can_pass("b").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_namespaced_with_prefix() {
        let (store, limiter) = setup(5, Duration::from_secs(60));
        limiter.can_pass("user").await.unwrap();

        assert_eq!(store.inner().ttl("ratelimit:user"), Some(Duration::from_secs(60)));
        assert_eq!(store.inner().ttl("user"), None);
    }

    #[tokio::test]
    async fn test_limiters_share_store_counters() {
        let store = Arc::new(FlakyStore::memory());
        let config = RateLimitConfig::new(3, Duration::from_secs(60));
        let first = RemoteRateLimiter::new(
            HealthMonitor::new(store.clone(), HealthConfig::default()),
            config.clone(),
        )
        .unwrap();
        let second = RemoteRateLimiter::new(
            HealthMonitor::new(store.clone(), HealthConfig::default()),
            config,
        )
        .unwrap();

        assert!(first.can_pass("k").await.unwrap());
        assert!(second.can_pass("k").await.unwrap());
        assert!(first.can_pass("k").await.unwrap());
        assert!(!second.can_pass("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_failure_reported_then_fast_fail() {
        let (store, limiter) = setup(10, Duration::from_secs(60));
        store.fail();

        let err = limiter.can_pass("user").await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(!limiter.health().is_ok());

        let calls = store.call_count();
        let err = limiter.can_pass("user").await.unwrap_err();
        assert!(matches!(err, crate::RateLimitError::StoreError(StoreError::Unavailable(_))));
        assert_eq!(store.call_count(), calls);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let store = Arc::new(FlakyStore::memory());
        let health = HealthMonitor::new(store, HealthConfig::default());
        assert!(RemoteRateLimiter::new(health, RateLimitConfig::new(0, Duration::from_secs(60))).is_err());
    }
}
