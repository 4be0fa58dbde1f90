//! Dedup cache trait and error types.

use async_trait::async_trait;
use std::fmt;

/// Errors that can occur during cache operations.
#[derive(Debug)]
pub enum CacheError {
    ConnectionError(String),
    OperationError(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ConnectionError(e) => write!(f, "Cache connection error: {}", e),
            Self::OperationError(e) => write!(f, "Cache operation error: {}", e),
        }
    }
}

impl std::error::Error for CacheError {}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Value stored for every admitted domain. Only key presence matters.
pub const ADMITTED_MARKER: &str = "1";

/// Key/value store with per-key expiry, used as the long-term dedup layer.
///
/// A key present in the cache means the domain was admitted inside the
/// current TTL window and must not be admitted again until it expires.
///
/// Implementations must be thread-safe. The domain queue treats the cache as
/// fail-open: a lookup error counts as "absent" and a failed write is logged,
/// so errors here only ever widen the admission window.
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::MemoryCache`] - In-process TTL map (default)
/// - [`crate::infrastructure::cache::RedisCache`] - Redis `GET` / `SET EX`
/// - [`crate::infrastructure::cache::NullCache`] - Never remembers anything
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DedupCache: Send + Sync {
    /// Returns the value stored under `key` if it has not expired.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Stores `value` under `key`, expiring `ttl_seconds` from now.
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> CacheResult<()>;

    /// Checks if the cache backend is reachable.
    async fn health_check(&self) -> bool;

    /// Short backend name for logs and the status endpoint.
    fn backend(&self) -> &'static str;
}
