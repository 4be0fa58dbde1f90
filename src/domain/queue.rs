//! Deduplicated accumulation buffer shared by every source and the submitter.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use tracing::{debug, trace, warn};

use crate::infrastructure::cache::{ADMITTED_MARKER, DedupCache};
use crate::utils::domain_validator::is_valid_domain;

/// Capacity of the admission feed. Subscribers that fall further behind
/// than this skip ahead and miss the oldest admissions.
const ADMISSION_FEED_CAPACITY: usize = 4096;

/// Outcome of offering a candidate to the queue.
///
/// Sources do not need to look at it: anything other than
/// [`Admission::Admitted`] is a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Appended to the queue and recorded in the dedup cache.
    Admitted,
    /// Already admitted inside the current TTL window.
    DuplicateInCache,
    /// Already waiting in the queue for the next drain.
    DuplicateInQueue,
    /// Not an admissible domain name.
    Invalid,
}

impl Admission {
    /// Stable label used for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::DuplicateInCache => "duplicate_in_cache",
            Self::DuplicateInQueue => "duplicate_in_queue",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for Admission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pending domains in admission order, plus a set mirroring them for O(1)
/// duplicate checks. Both are only touched under the queue lock.
#[derive(Default)]
struct Pending {
    domains: Vec<String>,
    index: HashSet<String>,
}

/// Domain queue with two dedup layers.
///
/// - **Short-term**: a domain is held at most once between two drains.
/// - **Long-term**: once admitted, a domain is suppressed for `ttl_seconds`
///   through the [`DedupCache`], across drains.
///
/// One instance is created at startup and shared through `Arc` with every
/// source and the batch submitter. `add`, `drain` and `count` serialize on a
/// single lock, so a domain admitted concurrently with a drain lands either
/// in that drain or in the next one, never in both and never in neither.
pub struct DomainQueue {
    pending: Mutex<Pending>,
    cache: Arc<dyn DedupCache>,
    ttl_seconds: u64,
    admissions: broadcast::Sender<String>,
}

impl DomainQueue {
    /// Creates an empty queue backed by `cache` with the given TTL window.
    pub fn new(cache: Arc<dyn DedupCache>, ttl_seconds: u64) -> Self {
        let (admissions, _) = broadcast::channel(ADMISSION_FEED_CAPACITY);
        Self {
            pending: Mutex::new(Pending::default()),
            cache,
            ttl_seconds,
            admissions,
        }
    }

    /// Offers a candidate domain. Rejections are silent.
    pub async fn add(&self, candidate: &str) {
        self.admit(candidate).await;
    }

    /// Offers a candidate domain and reports what happened to it.
    ///
    /// # Admission order
    ///
    /// 1. Lowercase the candidate
    /// 2. Skip if the dedup cache still holds it
    /// 3. Skip if it is not a valid domain name
    /// 4. Skip if it is already pending
    /// 5. Append, record in the cache with the TTL, publish on the admission feed
    ///
    /// The cache is fail-open: a failed lookup is treated as a miss and a
    /// failed write still admits the domain.
    pub async fn admit(&self, candidate: &str) -> Admission {
        let domain = candidate.to_lowercase();
        let mut pending = self.pending.lock().await;

        match self.cache.get(&domain).await {
            Ok(Some(_)) => return Self::rejected(&domain, Admission::DuplicateInCache),
            Ok(None) => {}
            Err(e) => debug!("Dedup cache lookup failed for {}: {}", domain, e),
        }

        if !is_valid_domain(&domain) {
            return Self::rejected(&domain, Admission::Invalid);
        }

        if pending.index.contains(&domain) {
            return Self::rejected(&domain, Admission::DuplicateInQueue);
        }

        pending.index.insert(domain.clone());
        pending.domains.push(domain.clone());

        if let Err(e) = self
            .cache
            .set_ex(&domain, ADMITTED_MARKER, self.ttl_seconds)
            .await
        {
            warn!("Failed to record {} in dedup cache: {}", domain, e);
        }

        debug!("Admitted {}", domain);
        metrics::counter!("pdns_domains_admitted_total").increment(1);

        // No subscribers is the normal case when enumeration is disabled.
        let _ = self.admissions.send(domain);

        Admission::Admitted
    }

    /// Removes and returns every pending domain in admission order.
    ///
    /// Returns an empty vector when nothing is pending.
    pub async fn drain(&self) -> Vec<String> {
        let mut pending = self.pending.lock().await;
        pending.index.clear();
        std::mem::take(&mut pending.domains)
    }

    /// Number of domains waiting for the next drain.
    pub async fn count(&self) -> usize {
        self.pending.lock().await.domains.len()
    }

    /// Subscribes to the feed of newly admitted domains.
    ///
    /// Only admissions made after subscribing are delivered.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.admissions.subscribe()
    }

    /// TTL of the long-term dedup window, in seconds.
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// The dedup cache backing this queue.
    pub fn cache(&self) -> &Arc<dyn DedupCache> {
        &self.cache
    }

    fn rejected(domain: &str, outcome: Admission) -> Admission {
        trace!("Rejected {} ({})", domain, outcome);
        metrics::counter!("pdns_domains_rejected_total", "reason" => outcome.as_str())
            .increment(1);
        outcome
    }
}
