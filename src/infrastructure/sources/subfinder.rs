//! Subdomain enumeration seeded by admitted domains.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Instant, interval_at};
use tracing::{debug, error, info, warn};

use super::lifecycle::Lifecycle;
use crate::domain::queue::DomainQueue;
use crate::domain::source::{Source, SourceError};

/// How often processed-parent entries are swept.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Upper bound on one `subfinder` run.
const ENUMERATION_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Discovers hostnames under a registrable domain.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubdomainEnumerator: Send + Sync {
    /// Returns every hostname found under `domain`.
    async fn enumerate(&self, domain: &str) -> Result<Vec<String>, SourceError>;
}

/// Runs the `subfinder` binary in silent mode.
pub struct SubfinderCli {
    program: String,
    timeout: Duration,
}

impl SubfinderCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: ENUMERATION_TIMEOUT,
        }
    }
}

#[async_trait]
impl SubdomainEnumerator for SubfinderCli {
    async fn enumerate(&self, domain: &str) -> Result<Vec<String>, SourceError> {
        let run = Command::new(&self.program)
            .args(["-d", domain, "-silent", "-nW", "-t", "10", "-timeout", "30", "-max-time", "10"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(output) => output.map_err(|error| SourceError::Spawn {
                program: self.program.clone(),
                error,
            })?,
            Err(_) => {
                warn!("Subfinder timed out for {}", domain);
                return Ok(Vec::new());
            }
        };

        if !output.status.success() {
            return Err(SourceError::Exited {
                program: self.program.clone(),
                status: output.status.to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Registrable parent of `domain` per the public suffix list.
///
/// `www.google.com` gives `google.com`, `sub.example.co.uk` gives
/// `example.co.uk`; a bare public suffix gives `None`.
pub fn parent_domain(domain: &str) -> Option<&str> {
    psl::domain_str(domain.trim_end_matches('.'))
}

/// Parents enumerated recently, with the time they were processed.
pub struct ProcessedParents {
    seen: HashMap<String, Instant>,
    ttl: Duration,
}

impl ProcessedParents {
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: HashMap::new(),
            ttl,
        }
    }

    /// `true` if `parent` was processed less than the TTL ago.
    pub fn is_recent(&self, parent: &str) -> bool {
        self.seen
            .get(parent)
            .is_some_and(|processed_at| processed_at.elapsed() < self.ttl)
    }

    pub fn mark(&mut self, parent: &str) {
        self.seen.insert(parent.to_string(), Instant::now());
    }

    /// Drops expired entries and returns how many were removed.
    pub fn sweep(&mut self) -> usize {
        let before = self.seen.len();
        let ttl = self.ttl;
        self.seen.retain(|_, processed_at| processed_at.elapsed() <= ttl);
        before - self.seen.len()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Enumerates subdomains of every newly admitted domain's parent.
///
/// Listens on the queue's admission feed instead of draining the queue, so
/// the submitter still sees every admitted domain. Each parent is enumerated
/// at most once per `reprocess_after`. Discovered hosts go through the
/// normal admission path; their own admissions come back on the feed and are
/// skipped because their parent was just processed.
pub struct SubfinderSource {
    queue: Arc<DomainQueue>,
    enumerator: Arc<dyn SubdomainEnumerator>,
    reprocess_after: Duration,
    lifecycle: Lifecycle,
}

impl SubfinderSource {
    pub fn new(
        queue: Arc<DomainQueue>,
        enumerator: Arc<dyn SubdomainEnumerator>,
        reprocess_after: Duration,
    ) -> Self {
        Self {
            queue,
            enumerator,
            reprocess_after,
            lifecycle: Lifecycle::new("subfinder"),
        }
    }

    /// Enumerates the parent of `domain` unless it was processed recently.
    ///
    /// Returns the number of hosts discovered.
    pub async fn process(&self, domain: &str, processed: &mut ProcessedParents) -> usize {
        let Some(parent) = parent_domain(domain) else {
            debug!("Could not extract parent domain of {}, skipping", domain);
            return 0;
        };

        if parent != domain {
            debug!("Extracted parent domain {} from {}", parent, domain);
        }

        if processed.is_recent(parent) {
            debug!("Parent domain {} recently processed, skipping", parent);
            return 0;
        }

        info!("Starting subdomain discovery for {}", parent);
        let discovered = tokio::select! {
            _ = self.lifecycle.token().cancelled() => {
                debug!("Subdomain discovery for {} cancelled", parent);
                return 0;
            }
            result = self.enumerator.enumerate(parent) => result,
        };
        processed.mark(parent);

        match discovered {
            Ok(hosts) => {
                for host in &hosts {
                    self.queue.add(host).await;
                }
                info!(
                    "Subdomain discovery for {} completed, discovered {}",
                    parent,
                    hosts.len()
                );
                hosts.len()
            }
            Err(e) => {
                error!("Subdomain discovery for {} failed: {}", parent, e);
                0
            }
        }
    }
}

#[async_trait]
impl Source for SubfinderSource {
    fn name(&self) -> &'static str {
        "subfinder"
    }

    async fn start(&self) -> Result<(), SourceError> {
        if self.lifecycle.is_stopping() {
            return Ok(());
        }
        let _running = self.lifecycle.begin();

        let mut admissions = self.queue.subscribe();
        let mut processed = ProcessedParents::new(self.reprocess_after);
        let mut cleanup = interval_at(Instant::now() + CLEANUP_INTERVAL, CLEANUP_INTERVAL);

        loop {
            tokio::select! {
                _ = self.lifecycle.token().cancelled() => return Ok(()),
                _ = cleanup.tick() => {
                    let removed = processed.sweep();
                    debug!("Cleaned up subfinder cache, removed {} entries", removed);
                }
                admitted = admissions.recv() => match admitted {
                    Ok(domain) => {
                        self.process(&domain, &mut processed).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Subfinder fell behind, skipped {} admitted domains", skipped);
                    }
                    Err(RecvError::Closed) => return Ok(()),
                },
            }
        }
    }

    async fn stop(&self, deadline: Duration) -> Result<(), SourceError> {
        self.lifecycle.stop(deadline).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::MemoryCache;

    fn queue() -> Arc<DomainQueue> {
        Arc::new(DomainQueue::new(Arc::new(MemoryCache::new()), 3600))
    }

    #[test]
    fn test_parent_domain() {
        assert_eq!(parent_domain("www.google.com"), Some("google.com"));
        assert_eq!(parent_domain("google.com"), Some("google.com"));
        assert_eq!(parent_domain("sub.example.co.uk"), Some("example.co.uk"));
        assert_eq!(parent_domain("www.example.com."), Some("example.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_processed_parents_expire() {
        let mut processed = ProcessedParents::new(Duration::from_secs(60));
        processed.mark("example.com");
        assert!(processed.is_recent("example.com"));
        assert!(!processed.is_recent("example.org"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!processed.is_recent("example.com"));
        assert_eq!(processed.sweep(), 1);
        assert!(processed.is_empty());
    }

    #[tokio::test]
    async fn test_process_adds_discovered_hosts() {
        let mut enumerator = MockSubdomainEnumerator::new();
        enumerator
            .expect_enumerate()
            .withf(|domain| domain == "example.com")
            .times(1)
            .returning(|_| {
                Ok(vec![
                    "api.example.com".to_string(),
                    "MAIL.example.com".to_string(),
                ])
            });

        let queue = queue();
        let source = SubfinderSource::new(
            queue.clone(),
            Arc::new(enumerator),
            Duration::from_secs(3600),
        );
        let mut processed = ProcessedParents::new(Duration::from_secs(3600));

        assert_eq!(source.process("www.example.com", &mut processed).await, 2);
        // Same parent again: skipped without calling the enumerator.
        assert_eq!(source.process("cdn.example.com", &mut processed).await, 0);

        assert_eq!(
            queue.drain().await,
            vec!["api.example.com", "mail.example.com"]
        );
    }

    #[tokio::test]
    async fn test_failed_enumeration_still_marks_parent() {
        let mut enumerator = MockSubdomainEnumerator::new();
        enumerator.expect_enumerate().times(1).returning(|_| {
            Err(SourceError::Exited {
                program: "subfinder".to_string(),
                status: "exit status: 1".to_string(),
            })
        });

        let source = SubfinderSource::new(queue(), Arc::new(enumerator), Duration::from_secs(3600));
        let mut processed = ProcessedParents::new(Duration::from_secs(3600));

        assert_eq!(source.process("example.org", &mut processed).await, 0);
        assert!(processed.is_recent("example.org"));
        assert_eq!(source.process("example.org", &mut processed).await, 0);
    }

    #[tokio::test]
    async fn test_start_enumerates_admitted_domains() {
        let mut enumerator = MockSubdomainEnumerator::new();
        enumerator
            .expect_enumerate()
            .withf(|domain| domain == "example.net")
            .times(1)
            .returning(|_| Ok(vec!["found.example.net".to_string()]));

        let queue = queue();
        let source = Arc::new(SubfinderSource::new(
            queue.clone(),
            Arc::new(enumerator),
            Duration::from_secs(3600),
        ));

        let runner = source.clone();
        let task = tokio::spawn(async move { runner.start().await });

        // Wait for the source to subscribe before admitting.
        while !source.lifecycle.is_running() {
            tokio::task::yield_now().await;
        }
        queue.add("www.example.net").await;

        while queue.count().await < 2 {
            tokio::task::yield_now().await;
        }

        source.stop(Duration::from_secs(5)).await.unwrap();
        task.await.unwrap().unwrap();

        assert_eq!(
            queue.drain().await,
            vec!["www.example.net", "found.example.net"]
        );
    }
}
