//! Periodic batch submission of drained domains.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::domain::queue::DomainQueue;
use crate::infrastructure::delivery::DeliveryClient;

/// Default number of domains per submitted batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1024;

/// Default time between drains.
pub const DEFAULT_SUBMIT_INTERVAL: Duration = Duration::from_secs(60);

/// What one tick drained and how delivery went.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub drained: usize,
    pub batches: usize,
    pub failed_batches: usize,
    pub failed_domains: usize,
}

/// Drains the queue on a fixed interval and submits the result in chunks.
///
/// Delivery is best effort: each chunk is attempted once, a failed chunk is
/// logged and dropped, and the remaining chunks of the tick are still sent.
/// Domains in a dropped chunk stay suppressed by the dedup cache until their
/// TTL expires.
pub struct BatchSubmitter {
    client: Arc<dyn DeliveryClient>,
    interval: Duration,
    max_batch_size: usize,
}

impl BatchSubmitter {
    /// Creates a submitter. A `max_batch_size` of zero is treated as one.
    pub fn new(client: Arc<dyn DeliveryClient>, interval: Duration, max_batch_size: usize) -> Self {
        Self {
            client,
            interval,
            max_batch_size: max_batch_size.max(1),
        }
    }

    /// Runs the submission loop until `shutdown` is cancelled.
    ///
    /// The first tick fires one full interval after start. On cancellation
    /// one last drain is submitted so pending domains are not lost on a
    /// clean shutdown.
    pub async fn run(self, queue: Arc<DomainQueue>, shutdown: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Batch submitter started (interval: {:?}, max batch size: {})",
            self.interval, self.max_batch_size
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    let report = self.tick(&queue).await;
                    info!(
                        "Batch submitter stopped, flushed {} pending domains",
                        report.drained
                    );
                    return;
                }
                _ = ticker.tick() => {
                    self.tick(&queue).await;
                }
            }
        }
    }

    /// Drains the queue once and submits whatever was pending.
    pub async fn tick(&self, queue: &DomainQueue) -> TickReport {
        let domains = queue.drain().await;
        self.submit_batches(&domains).await
    }

    /// Splits `domains` into chunks of at most `max_batch_size`, preserving
    /// order, and submits each chunk independently.
    pub async fn submit_batches(&self, domains: &[String]) -> TickReport {
        let mut report = TickReport {
            drained: domains.len(),
            ..TickReport::default()
        };

        if domains.is_empty() {
            return report;
        }

        let total = domains.len().div_ceil(self.max_batch_size);

        for (index, batch) in domains.chunks(self.max_batch_size).enumerate() {
            report.batches += 1;
            info!(
                "Submitting batch of {} domains (batch {}/{})",
                batch.len(),
                index + 1,
                total
            );

            match self.client.submit(batch).await {
                Ok(()) => {
                    metrics::counter!("pdns_batches_submitted_total").increment(1);
                    info!("Successfully submitted batch of {} domains", batch.len());
                }
                Err(e) => {
                    metrics::counter!("pdns_batches_failed_total").increment(1);
                    report.failed_batches += 1;
                    report.failed_domains += batch.len();
                    error!("Error submitting batch of {} domains: {}", batch.len(), e);
                }
            }
        }

        report
    }

    /// Upper bound on the size of a submitted batch.
    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}
