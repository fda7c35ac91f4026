//! Distributed Locks for Leasehold
//!
//! This crate provides mutual exclusion over a shared coordination store.
//!
//! ## Features
//!
//! - **Distributed Locks** - `SET NX` locks on Redis (or any
//!   [`CoordinationStore`](leasehold_store::CoordinationStore))
//! - **Lease Renewal** - held locks are extended at half their TTL until
//!   released
//! - **Local Locks** - in-process exclusion keyed by string
//! - **Fallback** - [`CombinatorLock`] degrades to local locks while the store
//!   is unreachable
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use leasehold_lock::*;
//! use leasehold_store::{HealthConfig, HealthMonitor, RedisConfig, RedisStore};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(RedisStore::new(RedisConfig::from_env().build()).await?);
//!     let health = HealthMonitor::new(store, HealthConfig::default());
//!
//!     let lock = CombinatorLock::new(health, LockConfig::new(Duration::from_secs(30)))?;
//!
//!     if let Some(entry) = lock.try_lock("my-resource").await? {
//!         println!("Lock acquired, doing work...");
//!         lock.unlock(entry).await?;
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod combinator;
pub mod config;
pub mod distributed;
pub mod local;
pub mod lock;
pub mod queue;
pub mod renewal;

pub use combinator::CombinatorLock;
pub use config::{LockConfig, LockConfigBuilder};
pub use distributed::DistributedLock;
pub use local::LocalLock;
pub use lock::{Lock, LockEntry, LockError, LockResult};
pub use queue::RenewalQueue;
pub use renewal::{Lease, RenewalScheduler};
