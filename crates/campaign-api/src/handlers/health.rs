//! Health check handler.

use axum::Json;
use axum::extract::State;

use crate::dto::response::HealthResponse;
use crate::state::AppState;

/// GET /health
///
/// Always answers 200; a down backend shows as `"degraded"`.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let backends = state.scheduler.context().backend_health().await;

    Json(HealthResponse {
        status: if backends.is_healthy() { "ok" } else { "degraded" }.to_string(),
        app: state.app_name.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: connection_label(backends.database),
        queue: connection_label(backends.queue),
        running_jobs: state.scheduler.running_count(),
        exiting: state.scheduler.is_exiting(),
    })
}

fn connection_label(up: bool) -> String {
    if up { "connected" } else { "unavailable" }.to_string()
}
