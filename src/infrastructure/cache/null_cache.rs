//! No-op cache implementation.

use super::service::{CacheResult, DedupCache};
use async_trait::async_trait;
use tracing::debug;

/// A cache that never remembers anything.
///
/// With this backend only the queue's in-memory layer deduplicates, so a
/// domain seen again after a drain is admitted again.
///
/// # Use Cases
///
/// - Testing the queue's in-memory dedup in isolation
/// - Deployments where the collector deduplicates on its own
pub struct NullCache;

impl NullCache {
    /// Creates a new NullCache instance.
    pub fn new() -> Self {
        debug!("Using NullCache (long-term dedup disabled)");
        Self
    }
}

impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DedupCache for NullCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Ok(None)
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl_seconds: u64) -> CacheResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_cache_forgets_everything() {
        let cache = NullCache::new();
        cache.set_ex("example.com", "1", 3600).await.unwrap();

        assert_eq!(cache.get("example.com").await.unwrap(), None);
        assert!(cache.health_check().await);
    }
}
