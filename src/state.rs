use std::sync::Arc;

use crate::domain::queue::DomainQueue;
use crate::infrastructure::cache::DedupCache;

/// Shared state of the status endpoint.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<DomainQueue>,
    pub cache: Arc<dyn DedupCache>,
}

impl AppState {
    pub fn new(queue: Arc<DomainQueue>) -> Self {
        let cache = queue.cache().clone();
        Self { queue, cache }
    }
}
