//! Competition-wide results

use axum::{
    extract::{Path, State},
    Json,
};
use bloc_common::ResultsSnapshot;

use super::ApiError;
use crate::broadcast::build_snapshot;
use crate::AppState;

/// GET /api/competitions/:id/results
///
/// The same snapshot live subscribers receive.
pub async fn get_competition_results(
    State(state): State<AppState>,
    Path(competition_id): Path<i64>,
) -> Result<Json<ResultsSnapshot>, ApiError> {
    let mut conn = state.db.acquire().await?;
    let snapshot = build_snapshot(&mut conn, competition_id).await?;
    Ok(Json(snapshot))
}
