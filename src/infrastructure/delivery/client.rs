//! Delivery client trait, wire payload and error types.

use async_trait::async_trait;
use serde::Serialize;

/// Errors returned when a batch cannot be delivered.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Request could not be sent or the connection failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Collector answered with anything other than 200.
    #[error("collector rejected batch with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Client could not be constructed.
    #[error("invalid client configuration: {0}")]
    Config(String),
}

/// JSON body of a submission.
///
/// ```json
/// {"domains": ["example.com", "example.org"]}
/// ```
#[derive(Debug, Serialize)]
pub struct PassiveDnsRequest<'a> {
    pub domains: &'a [String],
}

/// Accepts a bounded batch of domains and reports success or failure.
///
/// The submitter calls [`DeliveryClient::submit`] once per chunk and never
/// retries; implementations should not retry either.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Submits one batch.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] on transport failure or a non-success status.
    async fn submit(&self, domains: &[String]) -> Result<(), DeliveryError>;
}
