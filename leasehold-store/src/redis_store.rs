//! Redis coordination store.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::trace;

use crate::{
    CoordinationStore, RedisConfig, Result,
    pool::{RedisPool, RedisPoolBuilder},
    store::INCR_WITH_EXPIRY_SCRIPT,
};

/// Redis-backed coordination store.
///
/// Holds a bb8 connection pool; every operation checks a connection out for
/// the duration of one command.
pub struct RedisStore {
    config: RedisConfig,
    pool: RedisPool,
    incr_script: redis::Script,
}

impl RedisStore {
    /// Connect to Redis. Fails if the server does not answer a PING within
    /// the configured connection timeout.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let pool = RedisPoolBuilder::new(config.clone()).build().await?;
        Ok(Self::from_pool(config, pool))
    }

    /// Create from an existing pool.
    pub fn from_pool(config: RedisConfig, pool: RedisPool) -> Self {
        Self {
            config,
            pool,
            incr_script: redis::Script::new(INCR_WITH_EXPIRY_SCRIPT),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Get pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.pool.get().await?;

        // SET NX PX: atomic insert with TTL
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut *conn)
            .await?;

        trace!(key = %key, inserted = result.is_some(), "SET NX");
        Ok(result.is_some())
    }

    async fn del(&self, key: &str) -> Result<u64> {
        let mut conn = self.pool.get().await?;
        let deleted: u64 = conn.del(key).await?;
        Ok(deleted)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let updated: bool = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ttl.as_millis() as u64)
            .query_async(&mut *conn)
            .await?;
        Ok(updated)
    }

    async fn incr_with_expiry(&self, key: &str, window: Duration) -> Result<i64> {
        let mut conn = self.pool.get().await?;
        let count: i64 = self
            .incr_script
            .key(key)
            .arg(window.as_secs())
            .invoke_async(&mut *conn)
            .await?;
        Ok(count)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "redis"
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("url", &self.config.url)
            .finish()
    }
}

/// Connection pool statistics.
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Total connections.
    pub connections: u32,
    /// Idle connections.
    pub idle_connections: u32,
}

#[cfg(test)]
mod tests {
    // Run with: cargo test -p leasehold-store -- --ignored

    use super::*;

    async fn store() -> RedisStore {
        RedisStore::new(RedisConfig::new("redis://localhost:6379"))
            .await
            .unwrap()
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_set_nx_and_del() {
        let store = store().await;
        store.del("leasehold:test:setnx").await.unwrap();

        assert!(store.set_nx("leasehold:test:setnx", "a", Duration::from_secs(10)).await.unwrap());
        assert!(!store.set_nx("leasehold:test:setnx", "b", Duration::from_secs(10)).await.unwrap());
        assert!(store.expire("leasehold:test:setnx", Duration::from_secs(10)).await.unwrap());

        assert_eq!(store.del("leasehold:test:setnx").await.unwrap(), 1);
        assert!(!store.expire("leasehold:test:setnx", Duration::from_secs(10)).await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_incr_with_expiry() {
        let store = store().await;
        store.del("leasehold:test:incr").await.unwrap();

        assert_eq!(store.incr_with_expiry("leasehold:test:incr", Duration::from_secs(60)).await.unwrap(), 1);
        assert_eq!(store.incr_with_expiry("leasehold:test:incr", Duration::from_secs(60)).await.unwrap(), 2);

        let mut conn = store.pool.get().await.unwrap();
        let ttl: i64 = conn.ttl("leasehold:test:incr").await.unwrap();
        assert!(ttl > 0 && ttl <= 60);

        store.del("leasehold:test:incr").await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_ping() {
        let store = store().await;
        store.ping().await.unwrap();
        assert_eq!(store.store_type(), "redis");
        assert!(store.pool_stats().connections >= 1);
    }
}
