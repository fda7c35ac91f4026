//! Lock configuration and builder

use leasehold_store::serde_duration;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{LockError, LockResult};

/// Lock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Lease TTL set on acquisition and on every renewal. Must be positive.
    #[serde(with = "serde_duration::secs")]
    pub ttl: Duration,
    /// Upper bound on every store call made by the lock.
    #[serde(with = "serde_duration::millis")]
    pub op_timeout: Duration,
    /// Capacity of the renewal submission channel.
    pub submit_capacity: usize,
    /// Capacity of the renewal ring buffer before it spills to overflow.
    pub ring_capacity: usize,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            op_timeout: Duration::from_secs(2),
            submit_capacity: 4096,
            ring_capacity: 1024,
        }
    }
}

impl LockConfig {
    /// Create a configuration with the given lease TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            ..Default::default()
        }
    }

    /// Create a builder
    pub fn builder() -> LockConfigBuilder {
        LockConfigBuilder::new()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> LockConfigBuilder {
        let mut builder = LockConfigBuilder::new();

        if let Ok(ttl) = std::env::var("LOCK_TTL_SECS")
            && let Ok(secs) = ttl.parse() {
                builder = builder.ttl(Duration::from_secs(secs));
            }

        if let Ok(timeout) = std::env::var("LOCK_OP_TIMEOUT_MS")
            && let Ok(millis) = timeout.parse() {
                builder = builder.op_timeout(Duration::from_millis(millis));
            }

        if let Ok(capacity) = std::env::var("LOCK_RENEWAL_RING_CAPACITY")
            && let Ok(capacity) = capacity.parse() {
                builder = builder.ring_capacity(capacity);
            }

        builder
    }

    /// Delay between acquisition (or renewal) and the next renewal
    pub fn renew_after(&self) -> Duration {
        self.ttl / 2
    }

    /// Reject configurations the lock cannot run with
    pub fn validate(&self) -> LockResult<()> {
        // Redis PX takes whole milliseconds
        if self.ttl < Duration::from_millis(1) {
            return Err(LockError::config("lock ttl must be at least one millisecond"));
        }
        if self.op_timeout.is_zero() {
            return Err(LockError::config("store operation timeout must be positive"));
        }
        if self.submit_capacity == 0 || self.ring_capacity == 0 {
            return Err(LockError::config("renewal queue capacities must be positive"));
        }
        Ok(())
    }
}

/// Builder for lock configuration
#[derive(Default)]
pub struct LockConfigBuilder {
    config: LockConfig,
}

impl LockConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: LockConfig::default(),
        }
    }

    /// Set the lease TTL
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    /// Set the store operation timeout
    pub fn op_timeout(mut self, timeout: Duration) -> Self {
        self.config.op_timeout = timeout;
        self
    }

    /// Set the renewal submission channel capacity
    pub fn submit_capacity(mut self, capacity: usize) -> Self {
        self.config.submit_capacity = capacity;
        self
    }

    /// Set the renewal ring buffer capacity
    pub fn ring_capacity(mut self, capacity: usize) -> Self {
        self.config.ring_capacity = capacity;
        self
    }

    /// Build the configuration
    pub fn build(self) -> LockConfig {
        self.config
    }
}
