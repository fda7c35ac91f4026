//! # Leasehold Rate Limiting
//!
//! Fixed-window admission control keyed by string.
//!
//! ## Features
//!
//! - **Remote limiter**: counters live in the coordination store and are shared
//!   by every process using it; store outages fail fast through the
//!   [`HealthMonitor`](leasehold_store::HealthMonitor)
//! - **Local limiter**: in-process counters for single-instance deployments
//! - **Key namespacing**: store keys are prefixed (`ratelimit:{key}` by default)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use leasehold_ratelimit::{LocalRateLimiter, RateLimitConfig, RateLimiter};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // 10 requests per minute
//! let limiter = LocalRateLimiter::new(RateLimitConfig::new(10, Duration::from_secs(60)))?;
//!
//! if limiter.can_pass("user_123").await? {
//!     println!("Request allowed");
//! } else {
//!     println!("Rate limited");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Boundary Bursts
//!
//! Windows are fixed, not sliding: a client can make `max_requests` at the end
//! of one window and `max_requests` at the start of the next.

use async_trait::async_trait;

pub mod config;
pub mod error;
pub mod local;
pub mod remote;

pub use config::{RateLimitConfig, RateLimitConfigBuilder};
pub use error::{RateLimitError, RateLimitResult};
pub use local::LocalRateLimiter;
pub use remote::RemoteRateLimiter;

/// Admission decision for a key
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Record a request for `key` and report whether it is within the limit.
    ///
    /// A denied request returns `Ok(false)`; errors are reserved for store
    /// failures.
    async fn can_pass(&self, key: &str) -> RateLimitResult<bool>;
}

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::RateLimitConfig;
    pub use crate::error::{RateLimitError, RateLimitResult};
    pub use crate::local::LocalRateLimiter;
    pub use crate::remote::RemoteRateLimiter;
    pub use crate::RateLimiter;
}
