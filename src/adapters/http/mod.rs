//! HTTP adapters - the inbound REST boundary.

pub mod copilot;

use std::time::Duration;

use axum::Router;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use copilot::{copilot_routes, CopilotHandlers};

/// The application router with request tracing and a per-request timeout.
pub fn app_router(handlers: CopilotHandlers, request_timeout: Duration) -> Router {
    copilot_routes(handlers)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}
