//! Status endpoint routing.
//!
//! # Route Structure
//!
//! - `GET /health` - Queue depth and dedup cache connectivity
//!
//! # Middleware
//!
//! - **Tracing** - Request/response logging at debug level
//! - **Path normalization** - Trailing slash handling

use axum::Router;
use axum::routing::get;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

use crate::api::handlers::health_handler;
use crate::api::middleware::tracing;
use crate::state::AppState;

/// Constructs the status router with its middleware.
pub fn status_router(state: AppState) -> NormalizePath<Router> {
    let router = Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(tracing::layer());

    NormalizePathLayer::trim_trailing_slash().layer(router)
}
