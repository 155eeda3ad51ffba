//! Route definitions for the control API.

use axum::{Router, middleware as axum_middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(job_routes())
        .route("/health", get(handlers::health::health))
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Job control endpoints: start, stop, status
fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs/start", get(handlers::jobs::start_job))
        .route("/jobs/stop", get(handlers::jobs::stop_job))
        .route("/jobs/status", get(handlers::jobs::job_status))
}
