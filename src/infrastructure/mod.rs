//! Infrastructure layer for external integrations.
//!
//! This layer implements the interfaces defined by the domain layer.
//!
//! # Modules
//!
//! - [`cache`] - Dedup cache backends (Redis, in-memory and no-op)
//! - [`delivery`] - HTTP client for the passive DNS collector
//! - [`sources`] - Ingestion sources feeding the queue

pub mod cache;
pub mod delivery;
pub mod sources;
