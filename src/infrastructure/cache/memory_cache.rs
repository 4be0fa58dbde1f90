//! In-process TTL cache.

use super::service::{CacheResult, DedupCache};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Number of writes between sweeps of expired entries.
const SWEEP_EVERY: usize = 4096;

struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    writes_since_sweep: usize,
}

/// Cache kept in process memory.
///
/// Expiry is lazy: an expired entry is dropped when it is next looked up,
/// and the whole map is swept every few thousand writes so entries that are
/// never looked up again do not accumulate.
///
/// The contents are lost on restart, so a restarted sensor re-submits
/// domains it saw during the previous TTL window.
pub struct MemoryCache {
    inner: Mutex<Inner>,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let inner = self.lock();
        inner
            .entries
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    /// Returns `true` if no live entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the map half-updated,
        // so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DedupCache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        let mut inner = self.lock();

        match inner.entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                inner.entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> CacheResult<()> {
        let now = Instant::now();
        let mut inner = self.lock();

        inner.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + Duration::from_secs(ttl_seconds),
            },
        );

        inner.writes_since_sweep += 1;
        if inner.writes_since_sweep >= SWEEP_EVERY {
            let before = inner.entries.len();
            inner.entries.retain(|_, entry| entry.expires_at > now);
            inner.writes_since_sweep = 0;
            debug!(
                "Swept {} expired cache entries",
                before - inner.entries.len()
            );
        }

        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
