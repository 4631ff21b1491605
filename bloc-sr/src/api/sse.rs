//! Server-Sent Events for live competition results

use crate::broadcast::build_snapshot;
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::sse::{Event, Sse},
};
use bloc_common::events::ResultsEvent;
use bloc_common::sse::create_results_sse_stream;
use futures::stream::Stream;
use std::convert::Infallible;

use super::ApiError;

/// GET /api/competitions/:id/events
///
/// Streams `ResultsUpdated` and `RoundAdvanced` events. The first event is
/// always a `ResultsUpdated` carrying the current snapshot.
pub async fn event_stream(
    State(state): State<AppState>,
    Path(competition_id): Path<i64>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    // Subscribe before reading so no update can fall between snapshot and stream
    let subscription = state.service.broadcaster().hub().subscribe(competition_id);

    let mut conn = state.db.acquire().await?;
    let snapshot = build_snapshot(&mut conn, competition_id).await?;
    drop(conn);

    Ok(create_results_sse_stream(
        Some(ResultsEvent::ResultsUpdated { snapshot }),
        subscription,
    ))
}
