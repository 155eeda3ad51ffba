//! Job control handlers.

use axum::Json;
use axum::extract::{Query, State};

use campaign_entity::job::JobStatus;
use campaign_worker::RunningJobSnapshot;

use crate::dto::request::IdQuery;
use crate::dto::response::Ack;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /jobs/start?id=<id>
pub async fn start_job(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Ack>, ApiError> {
    let id = query.job_id()?;
    state.scheduler.start(id).await?;
    Ok(Json(Ack {}))
}

/// GET /jobs/stop?id=<id>
pub async fn stop_job(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Ack>, ApiError> {
    let id = query.job_id()?;
    state.scheduler.stop(id, JobStatus::Canceled).await?;
    Ok(Json(Ack {}))
}

/// GET /jobs/status
pub async fn job_status(State(state): State<AppState>) -> Json<Vec<RunningJobSnapshot>> {
    Json(state.scheduler.status())
}
