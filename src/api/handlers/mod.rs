//! HTTP request handlers for the status endpoint.

pub mod health;

pub use health::health_handler;
