//! # Leasehold Store
//!
//! Coordination store backends and store health monitoring.
//!
//! ## Features
//!
//! - **Store abstraction**: the handful of primitives locks and rate limiters
//!   need (`SET NX PX`, `DEL`, `PEXPIRE`, increment-with-expiry, `PING`)
//! - **Redis backend**: pooled connections with bb8
//! - **In-memory backend**: single-instance deployments and tests
//! - **Health monitoring**: fast-fail flag plus a single background recovery
//!   prober per outage
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use leasehold_store::{HealthConfig, HealthMonitor, RedisConfig, StoreType, connect};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RedisConfig::builder()
//!         .url("redis://localhost:6379")
//!         .pool_size(10)
//!         .build();
//!
//!     let store = connect(StoreType::Redis, &config).await?;
//!     let health = HealthMonitor::new(store.clone(), HealthConfig::default());
//!
//!     if health.is_ok() {
//!         if let Err(e) = store.ping().await {
//!             health.occur_err(&e);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod health;
mod memory;
mod pool;
mod redis_store;
pub mod serde_duration;
mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{HealthConfig, RedisConfig, RedisConfigBuilder, StoreType};
pub use error::{Result, StoreError};
pub use health::HealthMonitor;
pub use memory::MemoryStore;
pub use pool::{RedisPool, RedisPoolBuilder};
pub use redis_store::{PoolStats, RedisStore};
pub use store::{CoordinationStore, INCR_WITH_EXPIRY_SCRIPT, bounded, connect};

// Re-export redis crate for convenience
pub use redis;

/// Prelude for common imports.
///
/// ```
/// use leasehold_store::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{HealthConfig, RedisConfig, StoreType};
    pub use crate::error::{Result, StoreError};
    pub use crate::health::HealthMonitor;
    pub use crate::memory::MemoryStore;
    pub use crate::redis_store::RedisStore;
    pub use crate::store::{CoordinationStore, bounded, connect};
}
