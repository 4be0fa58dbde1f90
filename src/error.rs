//! Sensor-level errors surfaced by the runtime.
//!
//! Component errors stay close to their components:
//! [`SourceError`] for ingestion sources,
//! [`crate::infrastructure::delivery::DeliveryError`] for batch delivery and
//! [`crate::infrastructure::cache::CacheError`] for the dedup cache. This
//! type only describes why the sensor as a whole stopped.

use std::fmt;

use crate::domain::source::SourceError;

/// Failures that end a sensor run.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// A source failed and no restart delay is configured.
    #[error("{name} source failed: {error}")]
    SourceFailed {
        name: &'static str,
        error: SourceError,
    },

    /// One or more sources failed to stop cleanly.
    #[error("shutdown completed with errors: {}", StopFailures(.0))]
    Shutdown(Vec<(&'static str, SourceError)>),

    /// The status endpoint could not be started.
    #[error("status endpoint failed: {0}")]
    Status(#[from] std::io::Error),
}

struct StopFailures<'a>(&'a [(&'static str, SourceError)]);

impl fmt::Display for StopFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, error)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", name, error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_shutdown_lists_every_source() {
        let error = SensorError::Shutdown(vec![
            ("tcpdump", SourceError::StopTimeout(Duration::from_secs(10))),
            ("pcap", SourceError::Capture("device gone".to_string())),
        ]);

        assert_eq!(
            error.to_string(),
            "shutdown completed with errors: tcpdump: source did not stop within 10s; \
             pcap: packet capture error: device gone"
        );
    }

    #[test]
    fn test_source_failed_names_source() {
        let error = SensorError::SourceFailed {
            name: "mikrotik",
            error: SourceError::Unsupported("pcap"),
        };
        assert!(error.to_string().starts_with("mikrotik source failed"));
    }
}
