//! Ingestion sources.
//!
//! Each source turns some view of DNS traffic into candidate names:
//!
//! - [`TcpdumpSource`] - Parses `tcpdump` text output
//! - [`PcapSource`] - Decodes captured DNS packets (cargo feature `pcap`)
//! - [`MikrotikLogSource`] - Follows a RouterOS DNS log file
//! - [`SubfinderSource`] - Enumerates subdomains of newly admitted domains

mod dns_packet;
mod lifecycle;
mod mikrotik;
mod pcap;
mod subfinder;
mod tcpdump;

pub use dns_packet::{question_names, question_names_tcp};
pub use mikrotik::{DEFAULT_LOG_FILE, MikrotikLogSource};
pub use self::pcap::PcapSource;
pub use subfinder::{
    ProcessedParents, SubdomainEnumerator, SubfinderCli, SubfinderSource, parent_domain,
};
pub use tcpdump::TcpdumpSource;

/// Fields of a log line that look like fully qualified names, with the
/// trailing root dot removed.
///
/// `"... A? example.com. (29)"` yields `example.com`.
pub(crate) fn fqdn_fields(line: &str) -> impl Iterator<Item = &str> {
    line.split_whitespace()
        .filter_map(|field| field.strip_suffix('.'))
        .filter(|field| !field.is_empty())
}
