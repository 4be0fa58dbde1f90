#![allow(dead_code)]

use async_trait::async_trait;
use pdns_sensor::domain::queue::DomainQueue;
use pdns_sensor::infrastructure::cache::{CacheError, CacheResult, DedupCache, MemoryCache};
use pdns_sensor::infrastructure::delivery::{DeliveryClient, DeliveryError};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

pub const TTL_SECONDS: u64 = 3600;

/// Queue backed by a fresh in-memory cache.
pub fn memory_queue() -> Arc<DomainQueue> {
    Arc::new(DomainQueue::new(Arc::new(MemoryCache::new()), TTL_SECONDS))
}

/// Delivery client that records every batch it receives.
///
/// Batches whose 1-based position is in `failing` are rejected with a 500.
#[derive(Default)]
pub struct RecordingClient {
    batches: Mutex<Vec<Vec<String>>>,
    failing: HashSet<usize>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(positions: &[usize]) -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            failing: positions.iter().copied().collect(),
        }
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn delivered(&self) -> Vec<String> {
        self.batches().concat()
    }
}

#[async_trait]
impl DeliveryClient for RecordingClient {
    async fn submit(&self, domains: &[String]) -> Result<(), DeliveryError> {
        let mut batches = self.batches.lock().unwrap();
        batches.push(domains.to_vec());
        if self.failing.contains(&batches.len()) {
            return Err(DeliveryError::Status {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        Ok(())
    }
}

/// Dedup cache whose backend is always down.
pub struct UnreachableCache;

#[async_trait]
impl DedupCache for UnreachableCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Err(CacheError::ConnectionError("connection refused".to_string()))
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl_seconds: u64) -> CacheResult<()> {
        Err(CacheError::ConnectionError("connection refused".to_string()))
    }

    async fn health_check(&self) -> bool {
        false
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
