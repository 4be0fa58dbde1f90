//! DNS questions decoded from live packet capture.
//!
//! Capture needs libpcap and is only compiled with the `pcap` cargo
//! feature. Without it the source refuses to start.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::lifecycle::Lifecycle;
use crate::domain::queue::DomainQueue;
use crate::domain::source::{Source, SourceError};

/// Captures DNS traffic on a network device and feeds A/AAAA question names
/// to the queue.
pub struct PcapSource {
    #[cfg_attr(not(feature = "pcap"), allow(dead_code))]
    queue: Arc<DomainQueue>,
    #[cfg_attr(not(feature = "pcap"), allow(dead_code))]
    device: String,
    lifecycle: Lifecycle,
}

impl PcapSource {
    pub fn new(queue: Arc<DomainQueue>, device: impl Into<String>) -> Self {
        Self {
            queue,
            device: device.into(),
            lifecycle: Lifecycle::new("pcap"),
        }
    }
}

#[async_trait]
impl Source for PcapSource {
    fn name(&self) -> &'static str {
        "pcap"
    }

    #[cfg(feature = "pcap")]
    async fn start(&self) -> Result<(), SourceError> {
        use tokio::sync::mpsc;

        if self.lifecycle.is_stopping() {
            return Ok(());
        }
        let _running = self.lifecycle.begin();

        let (tx, mut rx) = mpsc::channel::<String>(capture::CHANNEL_CAPACITY);
        let device = self.device.clone();
        let token = self.lifecycle.token().clone();
        let capture = tokio::task::spawn_blocking(move || capture::run(&device, &tx, &token));

        // Ends when the capture thread drops its sender.
        while let Some(name) = rx.recv().await {
            self.queue.add(&name).await;
        }

        capture
            .await
            .map_err(|e| SourceError::Capture(format!("capture thread failed: {}", e)))?
    }

    #[cfg(not(feature = "pcap"))]
    async fn start(&self) -> Result<(), SourceError> {
        Err(SourceError::Unsupported("pcap"))
    }

    async fn stop(&self, deadline: Duration) -> Result<(), SourceError> {
        self.lifecycle.stop(deadline).await;
        Ok(())
    }
}

#[cfg(feature = "pcap")]
mod capture {
    use etherparse::{SlicedPacket, TransportSlice};
    use pcap::{Capture, Linktype};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;
    use tracing::{info, trace};

    use super::super::dns_packet::{question_names, question_names_tcp};
    use crate::domain::source::SourceError;

    pub(super) const CHANNEL_CAPACITY: usize = 1024;

    const SNAPLEN: i32 = 1600;
    const READ_TIMEOUT_MS: i32 = 500;
    const BPF_FILTER: &str = "port 53 and (udp or tcp)";

    fn capture_error(e: pcap::Error) -> SourceError {
        SourceError::Capture(e.to_string())
    }

    /// Blocking capture loop. Returns when `token` is cancelled, the
    /// receiver goes away, or the capture handle fails.
    pub(super) fn run(
        device: &str,
        tx: &mpsc::Sender<String>,
        token: &CancellationToken,
    ) -> Result<(), SourceError> {
        let mut capture = Capture::from_device(device)
            .map_err(capture_error)?
            .promisc(true)
            .snaplen(SNAPLEN)
            .timeout(READ_TIMEOUT_MS)
            .open()
            .map_err(capture_error)?;
        capture.filter(BPF_FILTER, true).map_err(capture_error)?;

        let linktype = capture.get_datalink();
        info!("Capturing on {} ({:?})", device, linktype);

        while !token.is_cancelled() {
            let packet = match capture.next_packet() {
                Ok(packet) => packet,
                Err(pcap::Error::TimeoutExpired) => continue,
                Err(e) => return Err(capture_error(e)),
            };

            for name in names_in_frame(linktype, packet.data) {
                if tx.blocking_send(name).is_err() {
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    fn names_in_frame(linktype: Linktype, frame: &[u8]) -> Vec<String> {
        let sliced = match linktype {
            Linktype::ETHERNET => SlicedPacket::from_ethernet(frame),
            Linktype::LINUX_SLL => SlicedPacket::from_linux_sll(frame),
            Linktype::RAW | Linktype::IPV4 | Linktype::IPV6 => SlicedPacket::from_ip(frame),
            other => {
                trace!("Unsupported link type {:?}", other);
                return Vec::new();
            }
        };

        match sliced {
            Ok(SlicedPacket {
                transport: Some(TransportSlice::Udp(udp)),
                ..
            }) => question_names(udp.payload()),
            Ok(SlicedPacket {
                transport: Some(TransportSlice::Tcp(tcp)),
                ..
            }) => question_names_tcp(tcp.payload()),
            Ok(_) => Vec::new(),
            Err(e) => {
                trace!("Skipping malformed frame: {}", e);
                Vec::new()
            }
        }
    }
}
