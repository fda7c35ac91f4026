//! # Leasehold
//!
//! Distributed mutual exclusion and request-rate control over a shared,
//! occasionally unavailable coordination store.
//!
//! ## Features
//!
//! - **Distributed locks** with automatic lease renewal
//!   ([`leasehold_lock::DistributedLock`])
//! - **Local fallback** while the store is down ([`CombinatorLock`])
//! - **Fixed-window rate limiting**, store-backed or in-process
//! - **Outage detection** with a single background recovery prober
//!   ([`HealthMonitor`])
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use leasehold::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let coordinator = Coordinator::connect(Settings::from_env()?).await?;
//!
//!     if let Some(entry) = coordinator.try_lock("nightly-report").await? {
//!         // Only one process gets here while the store is healthy
//!         coordinator.unlock(entry).await?;
//!     }
//!
//!     if !coordinator.can_pass("user:42").await? {
//!         println!("slow down");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Crates
//!
//! | crate | contents |
//! |---|---|
//! | [`store`] | store trait, Redis and in-memory backends, health monitor |
//! | [`lock`] | local, distributed and combinator locks, lease renewal |
//! | [`ratelimit`] | remote and local fixed-window limiters |

mod coordinator;
mod settings;

pub use coordinator::{Coordinator, CoordinatorError};
pub use settings::{Settings, SettingsError};

// Re-export member crates
pub use leasehold_lock as lock;
pub use leasehold_ratelimit as ratelimit;
pub use leasehold_store as store;

pub use leasehold_lock::{CombinatorLock, Lock, LockEntry, LockError};
pub use leasehold_ratelimit::{RateLimitError, RateLimiter};
pub use leasehold_store::{HealthMonitor, StoreError, StoreType};

/// Prelude for common imports
pub mod prelude {
    pub use crate::coordinator::{Coordinator, CoordinatorError};
    pub use crate::settings::{Settings, SettingsError};
    pub use leasehold_lock::{CombinatorLock, Lock, LockConfig, LockEntry, LockError};
    pub use leasehold_ratelimit::{RateLimitConfig, RateLimitError, RateLimiter};
    pub use leasehold_store::{HealthConfig, HealthMonitor, RedisConfig, StoreError, StoreType};
}
