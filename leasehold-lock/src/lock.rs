//! Lock trait, lock handles and lock errors

use async_trait::async_trait;
use leasehold_store::StoreError;
use std::sync::Arc;
use thiserror::Error;

use crate::renewal::Lease;

/// Result type for lock operations
pub type LockResult<T> = Result<T, LockError>;

/// Lock errors
///
/// Contention is not an error: a lock held by someone else is reported as
/// `Ok(None)` from [`Lock::try_lock`].
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid lock configuration: {0}")]
    InvalidConfig(String),

    #[error("Lock key must not be empty")]
    EmptyKey,
}

impl LockError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Check if this error came from the coordination store
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Check if the store was unreachable (as opposed to rejecting a command)
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_unavailable())
    }
}

/// Lock trait
#[async_trait]
pub trait Lock: Send + Sync {
    /// Try to acquire the lock for `key` without waiting.
    ///
    /// Returns `Ok(Some(entry))` when acquired and `Ok(None)` when another
    /// holder owns the key.
    async fn try_lock(&self, key: &str) -> LockResult<Option<LockEntry>>;

    /// Release a lock previously returned by [`Lock::try_lock`].
    async fn unlock(&self, entry: LockEntry) -> LockResult<()>;
}

/// Handle to a held lock
///
/// Store-backed entries carry the lease the renewal scheduler keeps alive;
/// entries granted by the local lock carry none.
#[derive(Debug)]
pub struct LockEntry {
    key: String,
    lease: Option<Arc<Lease>>,
}

impl LockEntry {
    pub(crate) fn local(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            lease: None,
        }
    }

    pub(crate) fn leased(lease: Arc<Lease>) -> Self {
        Self {
            key: lease.key().to_string(),
            lease: Some(lease),
        }
    }

    /// The locked key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether this entry was granted by the process-local lock
    pub fn is_local(&self) -> bool {
        self.lease.is_none()
    }

    /// The renewal lease, if any
    pub fn lease(&self) -> Option<&Arc<Lease>> {
        self.lease.as_ref()
    }

    /// Stop renewal of this entry's lease
    pub(crate) fn cancel_lease(&self) {
        if let Some(lease) = &self.lease {
            lease.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_local_entry() {
        let entry = LockEntry::local("orders:42");
        assert_eq!(entry.key(), "orders:42");
        assert!(entry.is_local());
        assert!(entry.lease().is_none());
    }

    #[test]
    fn test_leased_entry_cancel() {
        let lease = Lease::new("orders:42", Instant::now());
        let entry = LockEntry::leased(lease.clone());

        assert_eq!(entry.key(), "orders:42");
        assert!(!entry.is_local());

        entry.cancel_lease();
        assert!(lease.is_done());
    }

    #[test]
    fn test_error_classification() {
        let err = LockError::from(StoreError::Timeout);
        assert!(err.is_store_error());
        assert!(err.is_unavailable());

        let err = LockError::from(StoreError::command("WRONGTYPE"));
        assert!(err.is_store_error());
        assert!(!err.is_unavailable());

        assert!(!LockError::EmptyKey.is_store_error());
        assert!(!LockError::config("ttl").is_unavailable());
    }
}
