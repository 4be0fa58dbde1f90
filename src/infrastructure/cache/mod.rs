//! Dedup cache backing the domain queue's TTL window.
//!
//! Provides a [`DedupCache`] trait with three implementations:
//! - [`MemoryCache`] - In-process map with lazy expiry (default)
//! - [`RedisCache`] - Redis-backed cache shared between sensor restarts
//! - [`NullCache`] - No-op implementation that disables long-term dedup

mod memory_cache;
mod null_cache;
mod redis_cache;
mod service;

pub use memory_cache::MemoryCache;
pub use null_cache::NullCache;
pub use redis_cache::RedisCache;
pub use service::{ADMITTED_MARKER, CacheError, CacheResult, DedupCache};

#[cfg(test)]
pub use service::MockDedupCache;
