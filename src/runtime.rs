//! Sensor runtime: wiring, supervision and shutdown.
//!
//! Builds the dedup cache, queue, delivery client and enabled sources from
//! [`Config`], runs every source on its own task next to the batch
//! submitter, and tears everything down on Ctrl-C, SIGTERM or a fatal
//! source failure.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::ServiceExt;
use axum::extract::Request;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::routes::status_router;
use crate::config::{Config, SourceKind};
use crate::domain::queue::DomainQueue;
use crate::domain::source::{Source, SourceError};
use crate::domain::submitter::BatchSubmitter;
use crate::error::SensorError;
use crate::infrastructure::cache::{DedupCache, MemoryCache, RedisCache};
use crate::infrastructure::delivery::DomainsProjectClient;
use crate::infrastructure::sources::{
    MikrotikLogSource, PcapSource, SubfinderCli, SubfinderSource, TcpdumpSource,
};
use crate::state::AppState;

/// Extra time given to a source's own `stop` before it is abandoned.
const STOP_GRACE: Duration = Duration::from_secs(1);

/// Default per-source stop deadline.
const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

type SourceFailure = (&'static str, SourceError);

/// Runs the sensor with the given configuration until shutdown.
///
/// Initializes:
/// - Dedup cache (Redis, falling back to in-memory)
/// - Domain queue and batch submitter
/// - Enabled ingestion sources
/// - Optional status endpoint
///
/// # Errors
///
/// Returns an error if:
/// - The delivery client cannot be built
/// - The status endpoint cannot bind
/// - A source fails and no restart delay is configured
/// - A source fails to stop cleanly
pub async fn run(config: Config) -> Result<()> {
    let cache = build_cache(&config).await;
    let queue = Arc::new(DomainQueue::new(cache, config.cache_ttl_seconds));

    let client = DomainsProjectClient::builder(config.api_url.clone())
        .timeout(config.delivery_timeout())
        .build()?;
    let submitter = BatchSubmitter::new(
        Arc::new(client),
        config.submit_interval(),
        config.max_batch_size,
    );

    let sources = build_sources(&config, &queue);

    let status_shutdown = CancellationToken::new();
    if let Some(listen) = &config.status_listen {
        serve_status(listen, AppState::new(queue.clone()), status_shutdown.clone()).await?;
    }

    let result = Sensor::new(queue, submitter, sources)
        .with_restart_delay(config.source_restart_delay())
        .with_stop_timeout(config.shutdown_timeout())
        .run_until(shutdown_signal())
        .await;

    status_shutdown.cancel();
    result?;
    Ok(())
}

/// Connects the dedup cache.
///
/// Falls back to an in-memory cache when Redis is not configured or
/// unreachable at startup.
pub async fn build_cache(config: &Config) -> Arc<dyn DedupCache> {
    if let Some(redis_url) = &config.redis_url {
        match RedisCache::connect(redis_url).await {
            Ok(redis) => {
                info!("Dedup cache enabled (Redis)");
                Arc::new(redis)
            }
            Err(e) => {
                warn!("Failed to connect to Redis: {}. Using in-memory cache.", e);
                Arc::new(MemoryCache::new())
            }
        }
    } else {
        info!("Dedup cache: in-memory");
        Arc::new(MemoryCache::new())
    }
}

/// Instantiates every enabled source, in configuration order.
pub fn build_sources(config: &Config, queue: &Arc<DomainQueue>) -> Vec<Arc<dyn Source>> {
    config
        .sources
        .iter()
        .map(|kind| -> Arc<dyn Source> {
            match kind {
                SourceKind::Tcpdump => Arc::new(TcpdumpSource::new(
                    queue.clone(),
                    config.tcpdump_path.as_str(),
                    config.tcpdump_interface.as_str(),
                )),
                SourceKind::Pcap => {
                    Arc::new(PcapSource::new(queue.clone(), config.pcap_device.as_str()))
                }
                SourceKind::Mikrotik => Arc::new(MikrotikLogSource::new(
                    queue.clone(),
                    config.mikrotik_log_file.as_str(),
                )),
                SourceKind::Subfinder => Arc::new(SubfinderSource::new(
                    queue.clone(),
                    Arc::new(SubfinderCli::new(config.subfinder_path.as_str())),
                    Duration::from_secs(config.subfinder_ttl_seconds),
                )),
            }
        })
        .collect()
}

/// Binds the status endpoint and serves it until `shutdown` is cancelled.
async fn serve_status(
    listen: &str,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), SensorError> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!("Status endpoint listening on http://{}/health", listen);

    let app = status_router(state);
    tokio::spawn(async move {
        let served = axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
        if let Err(e) = served {
            error!("Status endpoint failed: {}", e);
        }
    });

    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Running set of sources around one queue and submitter.
pub struct Sensor {
    queue: Arc<DomainQueue>,
    submitter: BatchSubmitter,
    sources: Vec<Arc<dyn Source>>,
    restart_delay: Option<Duration>,
    stop_timeout: Duration,
}

impl Sensor {
    pub fn new(
        queue: Arc<DomainQueue>,
        submitter: BatchSubmitter,
        sources: Vec<Arc<dyn Source>>,
    ) -> Self {
        Self {
            queue,
            submitter,
            sources,
            restart_delay: None,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Restart failed sources after `delay` instead of shutting down.
    pub fn with_restart_delay(mut self, delay: Option<Duration>) -> Self {
        self.restart_delay = delay;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Runs sources and submitter until `signal` resolves or a source fails
    /// fatally, then shuts down.
    ///
    /// Shutdown order: sources are stopped first (concurrently, each bounded
    /// by the stop timeout), then the submitter performs a final drain so
    /// domains admitted up to that point are still delivered.
    ///
    /// # Errors
    ///
    /// - [`SensorError::SourceFailed`] if a source failed with no restart
    ///   delay configured
    /// - [`SensorError::Shutdown`] if any source failed to stop
    pub async fn run_until(self, signal: impl Future<Output = ()>) -> Result<(), SensorError> {
        let Sensor {
            queue,
            submitter,
            sources,
            restart_delay,
            stop_timeout,
        } = self;

        let submitter_shutdown = CancellationToken::new();
        let submitter_task = tokio::spawn(submitter.run(queue.clone(), submitter_shutdown.clone()));

        let supervisor_shutdown = CancellationToken::new();
        let (failures_tx, mut failures_rx) = mpsc::unbounded_channel::<SourceFailure>();
        let mut supervisors = JoinSet::new();
        for source in &sources {
            supervisors.spawn(supervise(
                source.clone(),
                restart_delay,
                supervisor_shutdown.clone(),
                failures_tx.clone(),
            ));
        }
        drop(failures_tx);
        info!("Sensor started with {} sources", sources.len());

        let fatal = tokio::select! {
            _ = signal => {
                info!("Shutdown signal received");
                None
            }
            Some((name, error)) = failures_rx.recv() => {
                error!("{} source failed: {}", name, error);
                Some(SensorError::SourceFailed { name, error })
            }
        };

        supervisor_shutdown.cancel();
        info!("Stopping {} sources...", sources.len());
        let stop_errors = stop_sources(&sources, stop_timeout).await;

        let drained = tokio::time::timeout(STOP_GRACE, async {
            while supervisors.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("Abandoning sources that did not finish after stop");
            supervisors.abort_all();
        }

        submitter_shutdown.cancel();
        if let Err(e) = submitter_task.await {
            error!("Submitter task failed: {}", e);
        }
        info!("Shutdown complete");

        if let Some(fatal) = fatal {
            return Err(fatal);
        }
        if !stop_errors.is_empty() {
            return Err(SensorError::Shutdown(stop_errors));
        }
        Ok(())
    }
}

/// Runs one source, restarting it after failures when a delay is set.
///
/// A failure with no restart delay is reported on `failures` and ends
/// supervision. Errors raised after shutdown began are only logged.
async fn supervise(
    source: Arc<dyn Source>,
    restart_delay: Option<Duration>,
    shutdown: CancellationToken,
    failures: mpsc::UnboundedSender<SourceFailure>,
) {
    let name = source.name();
    loop {
        let result = source.start().await;

        if shutdown.is_cancelled() {
            if let Err(e) = result {
                debug!("{} source ended during shutdown: {}", name, e);
            }
            return;
        }

        match (result, restart_delay) {
            (Ok(()), _) => {
                info!("{} source finished", name);
                return;
            }
            (Err(error), None) => {
                let _ = failures.send((name, error));
                return;
            }
            (Err(error), Some(delay)) => {
                error!(
                    "{} source failed: {}. Restarting in {}s",
                    name,
                    error,
                    delay.as_secs()
                );
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

/// Stops every source concurrently and collects the failures.
///
/// A source whose `stop` does not return within `deadline` plus a short
/// grace period is abandoned and reported as [`SourceError::StopTimeout`].
async fn stop_sources(sources: &[Arc<dyn Source>], deadline: Duration) -> Vec<SourceFailure> {
    let mut stopping = JoinSet::new();
    for source in sources {
        let source = source.clone();
        stopping.spawn(async move {
            let name = source.name();
            let result = match tokio::time::timeout(deadline + STOP_GRACE, source.stop(deadline))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(SourceError::StopTimeout(deadline)),
            };
            (name, result)
        });
    }

    let mut errors = Vec::new();
    while let Some(joined) = stopping.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((name, Err(e))) => {
                error!("Error stopping {} source: {}", name, e);
                errors.push((name, e));
            }
            Err(e) => error!("Stop task failed: {}", e),
        }
    }
    errors
}
