//! Start/stop bookkeeping shared by the source implementations.

use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancellation token plus a "currently running" flag.
///
/// `start` holds a [`RunGuard`] for as long as it runs; `stop` cancels the
/// token and waits for the guard to be dropped.
pub(crate) struct Lifecycle {
    name: &'static str,
    shutdown: CancellationToken,
    running: watch::Sender<bool>,
}

impl Lifecycle {
    pub(crate) fn new(name: &'static str) -> Self {
        let (running, _) = watch::channel(false);
        Self {
            name,
            shutdown: CancellationToken::new(),
            running,
        }
    }

    /// Marks the source as running until the returned guard is dropped.
    pub(crate) fn begin(&self) -> RunGuard<'_> {
        self.running.send_replace(true);
        info!("Starting {} source...", self.name);
        RunGuard {
            running: &self.running,
        }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Cancels the source and waits up to `deadline` for `start` to return.
    pub(crate) async fn stop(&self, deadline: Duration) {
        info!("Stopping {} source...", self.name);
        self.shutdown.cancel();

        let mut running = self.running.subscribe();
        match tokio::time::timeout(deadline, running.wait_for(|running| !*running)).await {
            Ok(_) => info!("{} source stopped", self.name),
            Err(_) => warn!("{} source stop timeout ({:?})", self.name, deadline),
        }
    }
}

/// Clears the running flag on drop, including on early returns and errors.
pub(crate) struct RunGuard<'a> {
    running: &'a watch::Sender<bool>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.send_replace(false);
    }
}
