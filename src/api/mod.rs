//! Optional HTTP status endpoint.
//!
//! Served only when `STATUS_LISTEN` is set. The sensor has no other HTTP
//! surface.
//!
//! # Modules
//!
//! - [`dto`] - Response serialization
//! - [`handlers`] - HTTP request handlers
//! - [`middleware`] - Request tracing
//! - [`routes`] - Route configuration

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod routes;
