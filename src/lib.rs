//! # pdns-sensor
//!
//! A passive DNS sensor: it watches DNS activity from several sources,
//! deduplicates the observed domain names and periodically submits them in
//! batches to a passive DNS collector.
//!
//! ## Architecture
//!
//! This crate follows Clean Architecture principles with clear layer separation:
//!
//! - **Domain Layer** ([`domain`]) - Domain queue, batch submitter and the source contract
//! - **Infrastructure Layer** ([`infrastructure`]) - Dedup cache, delivery client and sources
//! - **API Layer** ([`api`]) - Optional status endpoint
//! - **Runtime** ([`runtime`]) - Wiring, supervision and shutdown
//!
//! ## Features
//!
//! - Sources: `tcpdump` output, live packet capture, MikroTik RouterOS logs
//!   and subdomain enumeration of observed parents
//! - Two-layer deduplication: pending queue plus a TTL cache (Redis or in-memory)
//! - Bounded batches, failures isolated per batch
//! - Graceful shutdown with a final flush
//!
//! ## Quick Start
//!
//! ```bash
//! export SENSOR_SOURCES="tcpdump,subfinder"
//! export REDIS_URL="redis://localhost:6379"  # Optional
//!
//! cargo run --release
//! ```
//!
//! ## Configuration
//!
//! Sensor configuration is loaded from environment variables via [`config::Config`].
//! See [`config`] module for available options.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod runtime;
pub mod state;
pub mod utils;

pub use error::SensorError;
pub use state::AppState;

/// Commonly used types for external consumers.
///
/// Re-exports frequently used types to simplify imports for library users
/// and integration tests.
pub mod prelude {
    pub use crate::domain::queue::{Admission, DomainQueue};
    pub use crate::domain::source::{Source, SourceError};
    pub use crate::domain::submitter::{BatchSubmitter, TickReport};
    pub use crate::error::SensorError;
    pub use crate::infrastructure::cache::{DedupCache, MemoryCache, NullCache};
    pub use crate::infrastructure::delivery::{DeliveryClient, DeliveryError};
    pub use crate::state::AppState;
}
