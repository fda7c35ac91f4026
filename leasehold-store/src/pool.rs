//! Redis connection pool.

use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use tracing::info;

use crate::{RedisConfig, Result, StoreError};

/// Type alias for the connection pool.
pub type RedisPool = Pool<RedisConnectionManager>;

/// Builder for creating Redis connection pools.
pub struct RedisPoolBuilder {
    config: RedisConfig,
}

impl RedisPoolBuilder {
    /// Create a new pool builder.
    pub fn new(config: RedisConfig) -> Self {
        Self { config }
    }

    /// Build the connection pool and verify the server answers a PING
    /// within the connection timeout.
    pub async fn build(self) -> Result<RedisPool> {
        let url = self.config.connection_url();

        let manager = RedisConnectionManager::new(url)
            .map_err(|e| StoreError::Config(e.to_string()))?;

        let pool = Pool::builder()
            .max_size(self.config.pool_size)
            .min_idle(self.config.min_idle)
            .connection_timeout(self.config.connection_timeout)
            .build(manager)
            .await
            .map_err(StoreError::from)?;

        // Scoped so the connection goes back to the pool before returning it
        {
            let mut conn = pool.get().await?;
            let pong: redis::RedisResult<String> =
                tokio::time::timeout(self.config.connection_timeout, async {
                    redis::cmd("PING").query_async(&mut *conn).await
                })
                .await?;
            pong?;
        }

        info!(
            pool_size = self.config.pool_size,
            url = %self.config.url,
            "Redis connection pool created"
        );

        Ok(pool)
    }
}
