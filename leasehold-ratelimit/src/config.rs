//! Rate limiter configuration and builder

use leasehold_store::serde_duration;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{RateLimitError, RateLimitResult};

/// Configuration for fixed-window rate limiters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests admitted per key per window
    pub max_requests: u64,
    /// Window length, whole seconds
    #[serde(with = "serde_duration::secs")]
    pub interval: Duration,
    /// Namespace for store keys (`{prefix}:{key}`). Empty disables it.
    pub key_prefix: String,
    /// Upper bound on every store call made by the limiter
    #[serde(with = "serde_duration::millis")]
    pub op_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            interval: Duration::from_secs(60),
            key_prefix: "ratelimit".to_string(),
            op_timeout: Duration::from_secs(2),
        }
    }
}

impl RateLimitConfig {
    /// Create a configuration admitting `max_requests` per `interval`
    pub fn new(max_requests: u64, interval: Duration) -> Self {
        Self {
            max_requests,
            interval,
            ..Default::default()
        }
    }

    /// Create a new configuration builder
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::new()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> RateLimitConfigBuilder {
        let mut builder = RateLimitConfigBuilder::new();

        if let Ok(max) = std::env::var("RATELIMIT_MAX_REQUESTS")
            && let Ok(max) = max.parse() {
                builder = builder.max_requests(max);
            }

        if let Ok(interval) = std::env::var("RATELIMIT_INTERVAL_SECS")
            && let Ok(secs) = interval.parse() {
                builder = builder.interval(Duration::from_secs(secs));
            }

        if let Ok(prefix) = std::env::var("RATELIMIT_KEY_PREFIX") {
            builder = builder.key_prefix(prefix);
        }

        builder
    }

    /// Store key for a caller-supplied key
    pub fn store_key(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.key_prefix, key)
        }
    }

    /// Reject configurations the limiters cannot run with
    pub fn validate(&self) -> RateLimitResult<()> {
        if self.max_requests == 0 {
            return Err(RateLimitError::config("max_requests must be positive"));
        }
        // Store expiries are whole seconds
        if self.interval < Duration::from_secs(1) {
            return Err(RateLimitError::config("interval must be at least one second"));
        }
        if self.interval.subsec_nanos() != 0 {
            return Err(RateLimitError::config("interval must be a whole number of seconds"));
        }
        if self.op_timeout.is_zero() {
            return Err(RateLimitError::config("store operation timeout must be positive"));
        }
        Ok(())
    }
}

/// Builder for rate limiter configuration
#[derive(Default)]
pub struct RateLimitConfigBuilder {
    config: RateLimitConfig,
}

impl RateLimitConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: RateLimitConfig::default(),
        }
    }

    /// Set the number of requests admitted per window
    pub fn max_requests(mut self, max: u64) -> Self {
        self.config.max_requests = max;
        self
    }

    /// Set the window length
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Set the key prefix for storage
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into();
        self
    }

    /// Set the store operation timeout
    pub fn op_timeout(mut self, timeout: Duration) -> Self {
        self.config.op_timeout = timeout;
        self
    }

    /// Build the configuration
    pub fn build(self) -> RateLimitConfig {
        self.config
    }
}
