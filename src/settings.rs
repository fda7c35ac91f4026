//! Settings loading
//!
//! Settings come from a TOML file or from environment variables (a `.env`
//! file is honoured when present). Every section is optional and falls back to
//! its defaults.
//!
//! ```toml
//! store = "redis"
//!
//! [redis]
//! url = "redis://localhost:6379"
//! pool_size = 10
//!
//! [health]
//! probe_interval = 500
//!
//! [lock]
//! ttl = 30
//!
//! [ratelimit]
//! max_requests = 100
//! interval = 60
//! ```

use leasehold_lock::LockConfig;
use leasehold_ratelimit::RateLimitConfig;
use leasehold_store::{HealthConfig, RedisConfig, StoreType};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Settings errors
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    LoadError(String),

    #[error("Failed to parse settings: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Everything needed to build a [`Coordinator`](crate::Coordinator)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Coordination backend
    pub store: StoreType,
    /// Redis connection, used when `store` is `redis`
    pub redis: RedisConfig,
    /// Store health probing
    pub health: HealthConfig,
    /// Lock leases and renewal
    pub lock: LockConfig,
    /// Rate limiting
    pub ratelimit: RateLimitConfig,
}

impl Settings {
    /// Load and validate settings from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        debug!(path = %path.display(), "Loaded settings file");
        Self::from_toml(&content)
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content)
            .map_err(|e| SettingsError::ParseError(format!("TOML parse error: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load and validate settings from environment variables
    ///
    /// `LEASEHOLD_STORE` selects the backend; the sections read `REDIS_*`,
    /// `HEALTH_*`, `LOCK_*` and `RATELIMIT_*`.
    pub fn from_env() -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok(); // Ignore if .env doesn't exist

        let store = match std::env::var("LEASEHOLD_STORE") {
            Ok(name) => StoreType::parse(&name)
                .ok_or_else(|| SettingsError::ParseError(format!("Unknown store type: {}", name)))?,
            Err(_) => StoreType::default(),
        };

        let settings = Self {
            store,
            redis: RedisConfig::from_env().build(),
            health: HealthConfig::from_env(),
            lock: LockConfig::from_env().build(),
            ratelimit: RateLimitConfig::from_env().build(),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the coordinator cannot run with
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.lock
            .validate()
            .map_err(|e| SettingsError::ValidationError(e.to_string()))?;
        self.ratelimit
            .validate()
            .map_err(|e| SettingsError::ValidationError(e.to_string()))?;

        if self.health.probe_interval.is_zero() {
            return Err(SettingsError::ValidationError(
                "health probe interval must be positive".to_string(),
            ));
        }
        if self.store == StoreType::Redis && self.redis.url.is_empty() {
            return Err(SettingsError::ValidationError(
                "redis url is required for the redis store".to_string(),
            ));
        }
        Ok(())
    }
}
