//! Contract every ingestion source implements.

use async_trait::async_trait;
use std::time::Duration;

/// Errors raised by an ingestion source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to start {program}: {error}")]
    Spawn {
        program: String,
        error: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{program} exited unexpectedly: {status}")]
    Exited { program: String, status: String },

    #[error("packet capture error: {0}")]
    Capture(String),

    #[error("{0} source is not supported in this build")]
    Unsupported(&'static str),

    #[error("source did not stop within {0:?}")]
    StopTimeout(Duration),
}

/// A producer of candidate domain names.
///
/// `start` runs until the underlying mechanism ends or fails and feeds
/// every plausible candidate to [`crate::domain::queue::DomainQueue::add`].
/// Sources only trim format artifacts such as the trailing dot of a fully
/// qualified name; validation is left to the queue.
///
/// `start` is long-running and must be spawned on its own task. `stop`
/// requests a cooperative shutdown and returns once the source has wound
/// down or `deadline` has passed.
#[async_trait]
pub trait Source: Send + Sync {
    /// Short identifier used in configuration and logs.
    fn name(&self) -> &'static str;

    /// Runs the source until it finishes, fails, or is stopped.
    ///
    /// Returning `Ok(())` after `stop` was requested is a normal shutdown.
    async fn start(&self) -> Result<(), SourceError>;

    /// Requests shutdown and waits up to `deadline` for it to complete.
    ///
    /// Exceeding the deadline is logged by the implementation, not treated
    /// as an error. Errors are reserved for failures while tearing down.
    async fn stop(&self, deadline: Duration) -> Result<(), SourceError>;
}
