//! Process-local locks

use async_trait::async_trait;
use dashmap::DashSet;
use tracing::trace;

use crate::{Lock, LockEntry, LockError, LockResult};

/// In-process lock keyed by string.
///
/// Exclusion only holds within this process and there is no TTL: a key stays
/// locked until it is released.
#[derive(Debug, Default)]
pub struct LocalLock {
    keys: DashSet<String>,
}

impl LocalLock {
    /// Create a new local lock
    pub fn new() -> Self {
        Self {
            keys: DashSet::new(),
        }
    }

    /// Release `key`. Returns false if it was not held.
    pub fn release(&self, key: &str) -> bool {
        let released = self.keys.remove(key).is_some();
        trace!(key = %key, released = released, "Local lock release");
        released
    }

    /// Whether `key` is currently held
    pub fn is_locked(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Number of held keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no key is held
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl Lock for LocalLock {
    async fn try_lock(&self, key: &str) -> LockResult<Option<LockEntry>> {
        if key.is_empty() {
            return Err(LockError::EmptyKey);
        }

        if self.keys.insert(key.to_string()) {
            trace!(key = %key, "Acquired local lock");
            Ok(Some(LockEntry::local(key)))
        } else {
            Ok(None)
        }
    }

    async fn unlock(&self, entry: LockEntry) -> LockResult<()> {
        self.release(entry.key());
        Ok(())
    }
}
