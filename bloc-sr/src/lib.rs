//! bloc-sr library - Scoring and Results service
//!
//! Turns judges' climb submissions into scores, ranks and start lists, and
//! pushes updated competition results to live subscribers.

use axum::Router;
use bloc_common::ResultsHub;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod advancement;
pub mod api;
pub mod broadcast;
pub mod db;
pub mod pipeline;
pub mod ranking;
pub mod scoring;

use broadcast::Broadcaster;
use pipeline::ScoringService;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Write pipeline for climbs, rounds and start lists
    pub service: Arc<ScoringService>,
}

impl AppState {
    /// Create new application state around a results hub
    pub fn new(db: SqlitePool, hub: Arc<ResultsHub>, max_lock_wait_ms: u64) -> Self {
        let broadcaster = Arc::new(Broadcaster::new(hub));
        let service = Arc::new(ScoringService::new(db.clone(), broadcaster, max_lock_wait_ms));
        Self { db, service }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{delete, get, post};

    let api = Router::new()
        .route("/api/buildinfo", get(api::get_build_info))
        .route("/api/climbs", post(api::submit_climb))
        .route("/api/climbs/:id", delete(api::retract_climb))
        .route("/api/rounds/:id/results", get(api::get_round_results))
        .route("/api/rounds/:id/recompute", post(api::recompute_round))
        .route("/api/rounds/:id/advance", post(api::advance_round))
        .route(
            "/api/rounds/:id/start-list",
            get(api::get_start_list).post(api::add_start_list_entry),
        )
        .route(
            "/api/competitions/:id/results",
            get(api::get_competition_results),
        )
        .route("/api/competitions/:id/events", get(api::event_stream));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
