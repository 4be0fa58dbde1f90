//! HTTP middleware for the status endpoint.

pub mod tracing;
