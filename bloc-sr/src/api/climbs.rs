//! Judge endpoints for recording and retracting climbs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::ApiError;
use crate::pipeline::{ClimbSubmission, ClimbUpdate};
use crate::AppState;

/// POST /api/climbs
///
/// Records the outcome of one climber on one boulder, replacing any earlier
/// submission for the same pair. Responds with the climber's new score and
/// the re-ranked round.
pub async fn submit_climb(
    State(state): State<AppState>,
    Json(submission): Json<ClimbSubmission>,
) -> Result<(StatusCode, Json<ClimbUpdate>), ApiError> {
    let update = state.service.submit_climb(submission).await?;
    Ok((StatusCode::CREATED, Json(update)))
}

/// DELETE /api/climbs/:id
pub async fn retract_climb(
    State(state): State<AppState>,
    Path(climb_id): Path<i64>,
) -> Result<Json<ClimbUpdate>, ApiError> {
    let update = state.service.retract_climb(climb_id).await?;
    Ok(Json(update))
}
