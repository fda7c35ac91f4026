//! The coordination store abstraction.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::{MemoryStore, RedisConfig, RedisStore, Result, StoreType};

/// Atomically increments a counter and starts its expiry window on the first
/// hit. Both steps run server-side so no caller can observe a counter without
/// an expiry.
pub const INCR_WITH_EXPIRY_SCRIPT: &str = r#"
local res = redis.call('INCR', KEYS[1])
if res == 1
then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return res
"#;

/// Primitives the locks and rate limiters need from a shared key-value store.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Set `key` to `value` with a TTL only if it does not exist yet.
    /// Returns true when the key was inserted.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Delete a key, returning how many keys were removed.
    async fn del(&self, key: &str) -> Result<u64>;

    /// Reset the TTL of an existing key. Returns false if the key is gone.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Increment a counter; on the first increment set its expiry to `window`.
    /// Returns the post-increment value.
    async fn incr_with_expiry(&self, key: &str, window: Duration) -> Result<i64>;

    /// Lightweight reachability probe.
    async fn ping(&self) -> Result<()>;

    /// Backend name for debugging
    fn store_type(&self) -> &'static str;
}

/// Run a store call with an upper time bound. Elapsing counts as a store
/// failure (`StoreError::Timeout`).
pub async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, fut).await?
}

/// Build the configured backend.
pub async fn connect(store_type: StoreType, config: &RedisConfig) -> Result<Arc<dyn CoordinationStore>> {
    match store_type {
        StoreType::Redis => Ok(Arc::new(RedisStore::new(config.clone()).await?)),
        StoreType::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let result: Result<()> = bounded(Duration::from_secs(2), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

        assert_eq!(result, Err(StoreError::Timeout));
    }

    #[tokio::test]
    async fn test_bounded_passes_through() {
        let ok: Result<u64> = bounded(Duration::from_secs(2), async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<u64> =
            bounded(Duration::from_secs(2), async { Err(StoreError::command("nope")) }).await;
        assert_eq!(err, Err(StoreError::command("nope")));
    }

    #[tokio::test]
    async fn test_connect_memory() {
        let store = connect(StoreType::Memory, &RedisConfig::default()).await.unwrap();
        assert_eq!(store.store_type(), "memory");
        store.ping().await.unwrap();
    }
}
