//! Delivery of domain batches to the remote collector.
//!
//! - [`DeliveryClient`] - Transport-agnostic contract used by the submitter
//! - [`DomainsProjectClient`] - HTTP/JSON implementation

mod client;
mod domains_project;

pub use client::{DeliveryClient, DeliveryError, PassiveDnsRequest};
pub use domains_project::{DEFAULT_API_URL, DomainsProjectClient, DomainsProjectClientBuilder};

#[cfg(test)]
pub use client::MockDeliveryClient;
