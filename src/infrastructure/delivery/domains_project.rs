//! HTTP client for the Domains Project passive DNS collector.

use super::client::{DeliveryClient, DeliveryError, PassiveDnsRequest};
use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Default collector endpoint.
pub const DEFAULT_API_URL: &str = "https://api.domainsproject.org/api/ua/passive_dns";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body kept in [`DeliveryError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Posts batches as `{"domains": [...]}` and expects `200 OK`.
#[derive(Clone)]
pub struct DomainsProjectClient {
    http: HttpClient,
    api_url: String,
}

impl DomainsProjectClient {
    /// Creates a client for `api_url` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Config`] if the HTTP client cannot be built.
    pub fn new(api_url: impl Into<String>) -> Result<Self, DeliveryError> {
        DomainsProjectClientBuilder::new(api_url).build()
    }

    /// Creates a builder for custom configuration.
    pub fn builder(api_url: impl Into<String>) -> DomainsProjectClientBuilder {
        DomainsProjectClientBuilder::new(api_url)
    }

    /// Endpoint batches are posted to.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl DeliveryClient for DomainsProjectClient {
    async fn submit(&self, domains: &[String]) -> Result<(), DeliveryError> {
        if domains.is_empty() {
            return Ok(());
        }

        debug!(url = %self.api_url, count = domains.len(), "POST batch");

        let response = self
            .http
            .post(&self.api_url)
            .json(&PassiveDnsRequest { domains })
            .send()
            .await
            .map_err(|e| DeliveryError::Http(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut end = MAX_ERROR_BODY;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
        }

        Err(DeliveryError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Builder for configuring a [`DomainsProjectClient`].
pub struct DomainsProjectClientBuilder {
    api_url: String,
    timeout: Duration,
    user_agent: String,
}

impl DomainsProjectClientBuilder {
    /// Creates a new builder targeting `api_url`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("pdns-sensor/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the User-Agent header.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Config`] if the TLS backend cannot be initialised.
    pub fn build(self) -> Result<DomainsProjectClient, DeliveryError> {
        let http = HttpClient::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .build()
            .map_err(|e| DeliveryError::Config(e.to_string()))?;

        Ok(DomainsProjectClient {
            http,
            api_url: self.api_url,
        })
    }
}
