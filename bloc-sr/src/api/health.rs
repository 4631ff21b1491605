//! Health check endpoint
//!
//! Reports the service as healthy only while the scoring database answers.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub database: String,
    /// Competitions with at least one live results subscriber
    pub live_competitions: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.db)
        .await;

    let (status, code, database) = match database {
        Ok(_) => ("ok", StatusCode::OK, "ok".to_string()),
        Err(e) => {
            warn!("Health check database query failed: {}", e);
            ("degraded", StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            module: "bloc-sr".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database,
            live_competitions: state.service.broadcaster().hub().channel_count(),
        }),
    )
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
