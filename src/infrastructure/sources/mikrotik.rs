//! DNS queries logged by a MikroTik RouterOS device.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use super::fqdn_fields;
use super::lifecycle::Lifecycle;
use crate::domain::queue::DomainQueue;
use crate::domain::source::{Source, SourceError};

/// Device and inode of an open log file.
type FileId = (u64, u64);

#[cfg(unix)]
fn file_id(meta: &std::fs::Metadata) -> Option<FileId> {
    use std::os::unix::fs::MetadataExt;
    Some((meta.dev(), meta.ino()))
}

// Without inodes, replacement is only noticed when the file shrinks.
#[cfg(not(unix))]
fn file_id(_meta: &std::fs::Metadata) -> Option<FileId> {
    None
}

/// Default RouterOS remote-syslog target file.
pub const DEFAULT_LOG_FILE: &str = "/var/log/network.log";

/// How often the file is checked for new data once the end is reached.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Follows a syslog file written by RouterOS with `dns,packet` logging on.
///
/// The file is read from the beginning and then followed like `tail -F`:
/// appended lines are picked up every poll interval, and a file that shrank
/// or was replaced by a new file (rotation) is reopened and read from the
/// start. Bytes that are not UTF-8 are decoded lossily. Only query
/// lines contribute names:
///
/// ```text
/// Jan 01 12:00:00 dns,packet query from 192.168.1.1#54321: example.com. A
/// ```
pub struct MikrotikLogSource {
    queue: Arc<DomainQueue>,
    path: PathBuf,
    poll_interval: Duration,
    lifecycle: Lifecycle,
}

impl MikrotikLogSource {
    pub fn new(queue: Arc<DomainQueue>, path: impl Into<PathBuf>) -> Self {
        Self {
            queue,
            path: path.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            lifecycle: Lifecycle::new("mikrotik"),
        }
    }

    /// Overrides the follow poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Candidate names in one log line.
    pub fn query_candidates(line: &str) -> Vec<&str> {
        let line = line.trim();
        if !line.contains("query from") {
            return Vec::new();
        }
        fqdn_fields(line).collect()
    }

    async fn open(&self) -> Result<(BufReader<File>, Option<FileId>), SourceError> {
        let file = File::open(&self.path).await?;
        let id = file_id(&file.metadata().await?);
        Ok((BufReader::new(file), id))
    }

    /// Waits one poll interval. Returns `false` if the source was stopped.
    async fn idle(&self) -> bool {
        tokio::select! {
            _ = self.lifecycle.token().cancelled() => false,
            _ = tokio::time::sleep(self.poll_interval) => true,
        }
    }
}

#[async_trait]
impl Source for MikrotikLogSource {
    fn name(&self) -> &'static str {
        "mikrotik"
    }

    async fn start(&self) -> Result<(), SourceError> {
        if self.lifecycle.is_stopping() {
            return Ok(());
        }
        let _running = self.lifecycle.begin();

        let (mut reader, mut current) = self.open().await?;
        info!("Following {}", self.path.display());

        let mut position: u64 = 0;
        let mut line: Vec<u8> = Vec::new();

        loop {
            let read = tokio::select! {
                _ = self.lifecycle.token().cancelled() => return Ok(()),
                read = reader.read_until(b'\n', &mut line) => read?,
            };

            if read > 0 {
                position += read as u64;
                // A line without its newline is still being written.
                if line.ends_with(b"\n") {
                    // Syslog lines are not guaranteed to be UTF-8.
                    let text = String::from_utf8_lossy(&line);
                    for candidate in Self::query_candidates(&text) {
                        self.queue.add(candidate).await;
                    }
                    line.clear();
                }
                continue;
            }

            if !self.idle().await {
                return Ok(());
            }

            match fs::metadata(&self.path).await {
                Ok(meta) if meta.len() < position || file_id(&meta) != current => {
                    debug!("{} was truncated or replaced, reopening", self.path.display());
                    (reader, current) = self.open().await?;
                    position = 0;
                    line.clear();
                }
                Ok(_) => {}
                // Rotated away; wait for the writer to recreate it.
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn stop(&self, deadline: Duration) -> Result<(), SourceError> {
        self.lifecycle.stop(deadline).await;
        Ok(())
    }
}
