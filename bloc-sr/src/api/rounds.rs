//! Round endpoints: results, recomputation, advancement and start lists

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use bloc_common::db::RoundResult;
use bloc_common::events::RoundResults;

use super::ApiError;
use crate::advancement::AdvanceOutcome;
use crate::broadcast::ranked_entries;
use crate::db;
use crate::pipeline::StartListRequest;
use crate::AppState;

/// GET /api/rounds/:id/results
///
/// Ranked entries of one round, unranked climbers last.
pub async fn get_round_results(
    State(state): State<AppState>,
    Path(round_id): Path<i64>,
) -> Result<Json<RoundResults>, ApiError> {
    let mut conn = state.db.acquire().await?;
    let round = db::get_round(&mut conn, round_id).await?;
    let entries = ranked_entries(&mut conn, round.id).await?;

    Ok(Json(RoundResults {
        round_id: round.id,
        name: round.name,
        round_order: round.round_order,
        entries,
    }))
}

/// POST /api/rounds/:id/recompute
pub async fn recompute_round(
    State(state): State<AppState>,
    Path(round_id): Path<i64>,
) -> Result<Json<Vec<RoundResult>>, ApiError> {
    let results = state.service.recompute_round(round_id).await?;
    Ok(Json(results))
}

/// POST /api/rounds/:id/advance
///
/// Safe to repeat: climbers already on the next start list are not added
/// twice.
pub async fn advance_round(
    State(state): State<AppState>,
    Path(round_id): Path<i64>,
) -> Result<Json<AdvanceOutcome>, ApiError> {
    let outcome = state.service.advance_round(round_id).await?;
    Ok(Json(outcome))
}

/// GET /api/rounds/:id/start-list
pub async fn get_start_list(
    State(state): State<AppState>,
    Path(round_id): Path<i64>,
) -> Result<Json<Vec<RoundResult>>, ApiError> {
    let mut conn = state.db.acquire().await?;
    db::get_round(&mut conn, round_id).await?;
    let entries = db::get_start_list(&mut conn, round_id).await?;
    Ok(Json(entries))
}

/// POST /api/rounds/:id/start-list
pub async fn add_start_list_entry(
    State(state): State<AppState>,
    Path(round_id): Path<i64>,
    Json(request): Json<StartListRequest>,
) -> Result<(StatusCode, Json<RoundResult>), ApiError> {
    let entry = state.service.add_start_list_entry(round_id, request).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}
