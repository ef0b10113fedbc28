//! In-memory key/value store for testing.

use crate::error::{GatewayError, Result};
use crate::kv::KvStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

/// In-memory [`KvStore`] with TTL bookkeeping.
///
/// Expiry is evaluated lazily on access, which is enough for tests that
/// assert on TTL-driven behaviour without a Redis instance.
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) keys. Test helper.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        let now = Instant::now();
        Ok(self
            .lock()?
            .values()
            .filter(|e| e.expires_at.map_or(true, |at| at > now))
            .count())
    }

    /// `true` if no live keys remain. Test helper.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Remaining TTL of a key, if it has one. Test helper.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn ttl_of(&self, key: &str) -> Result<Option<Duration>> {
        let now = Instant::now();
        Ok(self
            .lock()?
            .get(key)
            .and_then(|e| e.expires_at)
            .and_then(|at| at.checked_duration_since(now)))
    }

    /// Force-expire a key, simulating TTL lapse. Test helper.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn expire_now(&self, key: &str) -> Result<()> {
        if let Some(entry) = self.lock()?.get_mut(key) {
            entry.expires_at = Some(Instant::now());
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| GatewayError::Internal("Mutex lock failed".to_string()))
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        let mut entries = self.lock()?;

        let expires_at = match ttl_seconds {
            Some(ttl) => Some(Instant::now() + Duration::from_secs(ttl)),
            // Preserve the existing expiry, as Redis SET KEEPTTL does.
            None => entries.get(key).and_then(|e| e.expires_at),
        };

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.lock()?;

        match entries.get(key) {
            Some(entry) => {
                if entry.expires_at.is_some_and(|at| at <= Instant::now()) {
                    entries.remove(key);
                    Ok(None)
                } else {
                    Ok(Some(entry.value.clone()))
                }
            }
            None => Ok(None),
        }
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn healthy(&self) -> bool {
        true
    }
}
