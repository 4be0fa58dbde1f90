//! DNS queries observed through `tcpdump` text output.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

use super::fqdn_fields;
use super::lifecycle::Lifecycle;
use crate::domain::queue::DomainQueue;
use crate::domain::source::{Source, SourceError};

/// Runs `tcpdump -l -n -i <interface> port 53` and feeds queried names to
/// the queue.
///
/// Only lines describing an A or AAAA question are considered, e.g.
///
/// ```text
/// 15:30:45.123456 IP 192.168.1.1.54321 > 8.8.8.8.53: 12345+ A? example.com. (29)
/// ```
pub struct TcpdumpSource {
    queue: Arc<DomainQueue>,
    program: String,
    interface: String,
    lifecycle: Lifecycle,
}

impl TcpdumpSource {
    pub fn new(
        queue: Arc<DomainQueue>,
        program: impl Into<String>,
        interface: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            program: program.into(),
            interface: interface.into(),
            lifecycle: Lifecycle::new("tcpdump"),
        }
    }

    /// Candidate names in one line of tcpdump output.
    pub fn query_candidates(line: &str) -> Vec<&str> {
        let line = line.trim();
        if line.is_empty() || !line.contains("IP") {
            return Vec::new();
        }
        if !line.contains("A?") && !line.contains("AAAA?") {
            return Vec::new();
        }
        fqdn_fields(line).collect()
    }

    fn args(&self) -> [&str; 6] {
        ["-l", "-n", "-i", self.interface.as_str(), "port", "53"]
    }
}

#[async_trait]
impl Source for TcpdumpSource {
    fn name(&self) -> &'static str {
        "tcpdump"
    }

    async fn start(&self) -> Result<(), SourceError> {
        if self.lifecycle.is_stopping() {
            return Ok(());
        }
        let _running = self.lifecycle.begin();

        let mut child = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| SourceError::Spawn {
                program: self.program.clone(),
                error,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::Io(std::io::Error::other("tcpdump stdout not captured")))?;
        let mut reader = BufReader::new(stdout);
        let mut line: Vec<u8> = Vec::new();

        loop {
            line.clear();
            let read = tokio::select! {
                _ = self.lifecycle.token().cancelled() => {
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill tcpdump: {}", e);
                    }
                    return Ok(());
                }
                read = reader.read_until(b'\n', &mut line) => read?,
            };
            if read == 0 {
                break;
            }

            // Payload snippets in the output may not be UTF-8.
            let text = String::from_utf8_lossy(&line);
            for candidate in Self::query_candidates(&text) {
                self.queue.add(candidate).await;
            }
        }

        let status = child.wait().await?;
        if status.success() {
            info!("tcpdump finished successfully");
            Ok(())
        } else {
            Err(SourceError::Exited {
                program: self.program.clone(),
                status: status.to_string(),
            })
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

    #[test]
    fn test_query_candidates() {
        let cases = [
            (
                "15:30:45.123456 IP 192.168.1.1.54321 > 8.8.8.8.53: 12345+ A? example.com. (29)",
                vec!["example.com"],
            ),
            (
                "15:30:45.123456 IP 192.168.1.1.54321 > 8.8.8.8.53: 12345+ AAAA? test.example.org. (29)",
                vec!["test.example.org"],
            ),
            (
                "15:30:45.123456 IP 192.168.1.1.54321 > 8.8.8.8.53: 12345+ MX? example.com. (29)",
                vec![],
            ),
            (
                "15:30:45.123456 ARP, Request who-has 192.168.1.1 tell 192.168.1.2",
                vec![],
            ),
            ("", vec![]),
            (
                "15:30:45.123456 IP 192.168.1.1.54321 > 8.8.8.8.53: 12345+ A? google.com. yahoo.com. (29)",
                vec!["google.com", "yahoo.com"],
            ),
        ];

        for (line, expected) in cases {
            assert_eq!(TcpdumpSource::query_candidates(line), expected, "{line}");
        }
    }

    #[tokio::test]
    async fn test_missing_binary_fails_to_start() {
        let queue = Arc::new(DomainQueue::new(Arc::new(MemoryCache::new()), 3600));
        let source = TcpdumpSource::new(queue, "/nonexistent/tcpdump", "any");

        let result = source.start().await;
        assert!(matches!(result, Err(SourceError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_start_after_stop_is_a_no_op() {
        let queue = Arc::new(DomainQueue::new(Arc::new(MemoryCache::new()), 3600));
        let source = TcpdumpSource::new(queue, "/nonexistent/tcpdump", "any");

        source.stop(Duration::from_millis(10)).await.unwrap();
        assert!(source.start().await.is_ok());
    }
}
