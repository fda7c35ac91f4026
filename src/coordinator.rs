//! Coordinator wiring

use leasehold_lock::{CombinatorLock, Lock, LockEntry, LockError, LockResult};
use leasehold_ratelimit::{
    LocalRateLimiter, RateLimitError, RateLimitResult, RateLimiter, RemoteRateLimiter,
};
use leasehold_store::{CoordinationStore, HealthMonitor, StoreError, StoreType, connect};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::settings::{Settings, SettingsError};

/// Errors building a [`Coordinator`]
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
}

/// One store, its health monitor, a fallback lock and a rate limiter.
///
/// The rate limiter shares counters through the store when the store is Redis
/// and keeps them in process memory otherwise.
pub struct Coordinator {
    settings: Settings,
    health: HealthMonitor,
    lock: CombinatorLock,
    limiter: Arc<dyn RateLimiter>,
}

impl Coordinator {
    /// Connect to the configured store and build every component
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use leasehold::{Coordinator, Settings};
    ///
    /// let coordinator = Coordinator::connect(Settings::from_file("leasehold.toml")?).await?;
    ///
    /// if coordinator.can_pass("user:42").await? {
    ///     if let Some(entry) = coordinator.try_lock("report:daily").await? {
    ///         // ...
    ///         coordinator.unlock(entry).await?;
    ///     }
    /// }
    /// ```
    pub async fn connect(settings: Settings) -> Result<Self, CoordinatorError> {
        settings.validate()?;
        let store = connect(settings.store, &settings.redis).await?;
        Self::with_store(store, settings)
    }

    /// Build every component over an already connected store
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_store(
        store: Arc<dyn CoordinationStore>,
        settings: Settings,
    ) -> Result<Self, CoordinatorError> {
        settings.validate()?;

        let health = HealthMonitor::new(store, settings.health.clone());
        let lock = CombinatorLock::new(health.clone(), settings.lock.clone())?;
        let limiter: Arc<dyn RateLimiter> = match settings.store {
            StoreType::Redis => Arc::new(RemoteRateLimiter::new(
                health.clone(),
                settings.ratelimit.clone(),
            )?),
            StoreType::Memory => Arc::new(LocalRateLimiter::new(settings.ratelimit.clone())?),
        };

        info!(
            store = health.store().store_type(),
            lock_ttl = ?settings.lock.ttl,
            max_requests = settings.ratelimit.max_requests,
            "Coordinator ready"
        );

        Ok(Self {
            settings,
            health,
            lock,
            limiter,
        })
    }

    /// Try to take the lock on `key` without waiting
    pub async fn try_lock(&self, key: &str) -> LockResult<Option<LockEntry>> {
        self.lock.try_lock(key).await
    }

    /// Release a held lock
    pub async fn unlock(&self, entry: LockEntry) -> LockResult<()> {
        self.lock.unlock(entry).await
    }

    /// Record a request for `key` and report whether it is within the limit
    pub async fn can_pass(&self, key: &str) -> RateLimitResult<bool> {
        self.limiter.can_pass(key).await
    }

    /// Whether the store is currently considered reachable
    pub fn is_ok(&self) -> bool {
        self.health.is_ok()
    }

    /// Report a store failure observed outside the coordinator
    pub fn occur_err(&self, err: &StoreError) {
        self.health.occur_err(err);
    }

    /// Last recorded store failure, `None` while healthy
    pub fn error(&self) -> Option<StoreError> {
        self.health.error()
    }

    /// The shared health monitor
    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// The lock behind `try_lock`/`unlock`
    pub fn lock(&self) -> &CombinatorLock {
        &self.lock
    }

    /// Settings the coordinator was built from
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
