//! Live update broadcaster
//!
//! Rebuilds a competition's full results snapshot and hands it to the
//! competition's channel in the [`ResultsHub`]. Publishing is best-effort: any
//! failure is logged and never reaches the scoring operation that triggered
//! it.

use crate::db;
use bloc_common::events::{CategoryResults, RankedEntry, ResultsEvent, RoundResults};
use bloc_common::{Result, ResultsHub, ResultsSnapshot};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

type RankedRow = (Option<i64>, i64, String, i64, i64, i64, i64, f64);

/// Build the full results snapshot of a competition
pub async fn build_snapshot(
    conn: &mut SqliteConnection,
    competition_id: i64,
) -> Result<ResultsSnapshot> {
    db::get_competition(&mut *conn, competition_id).await?;

    let mut snapshot = ResultsSnapshot::empty(competition_id);
    for category in db::get_categories_for_competition(&mut *conn, competition_id).await? {
        let mut rounds = Vec::new();
        for round in db::get_rounds_in_category(&mut *conn, category.id).await? {
            rounds.push(RoundResults {
                round_id: round.id,
                name: round.name,
                round_order: round.round_order,
                entries: ranked_entries(&mut *conn, round.id).await?,
            });
        }
        snapshot.categories.push(CategoryResults {
            category_id: category.id,
            name: category.name,
            rounds,
        });
    }

    Ok(snapshot)
}

/// Start-list climbers of a round with their scores, best rank first
pub async fn ranked_entries(conn: &mut SqliteConnection, round_id: i64) -> Result<Vec<RankedEntry>> {
    let rows = sqlx::query_as::<_, RankedRow>(
        r#"
        SELECT rr.rank, rr.climber_id, c.name,
               COALESCE(s.tops, 0), COALESCE(s.attempts_top, 0),
               COALESCE(s.zones, 0), COALESCE(s.attempts_zone, 0),
               COALESCE(s.total_score, 0.0)
        FROM round_results rr
        JOIN climbers c ON c.id = rr.climber_id
        LEFT JOIN climber_round_scores s
               ON s.round_id = rr.round_id AND s.climber_id = rr.climber_id
        WHERE rr.round_id = ? AND rr.deleted = 0
        ORDER BY rr.rank IS NULL, rr.rank ASC, c.name ASC, rr.climber_id ASC
        "#,
    )
    .bind(round_id)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(rank, climber_id, climber_name, tops, attempts_top, zones, attempts_zone, total_score)| {
                RankedEntry {
                    rank,
                    climber_id,
                    climber_name,
                    tops,
                    attempts_top,
                    zones,
                    attempts_zone,
                    total_score,
                }
            },
        )
        .collect())
}

/// Publishes snapshots, one publisher at a time per competition
///
/// Serializing build-and-send per competition means the last publish always
/// carries the latest committed state.
pub struct Broadcaster {
    hub: Arc<ResultsHub>,
    gates: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl Broadcaster {
    pub fn new(hub: Arc<ResultsHub>) -> Self {
        Self {
            hub,
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn hub(&self) -> &Arc<ResultsHub> {
        &self.hub
    }

    fn gate(&self, competition_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(gates.entry(competition_id).or_default())
    }

    /// Drop the gate of a competition nobody listens to and nobody holds
    fn release_gate(&self, competition_id: i64) {
        if self.hub.subscriber_count(competition_id) > 0 {
            return;
        }
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        if gates
            .get(&competition_id)
            .is_some_and(|gate| Arc::strong_count(gate) == 1)
        {
            gates.remove(&competition_id);
        }
    }

    /// Number of competitions with a publish gate
    pub fn gate_count(&self) -> usize {
        self.gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Recompute and push the results snapshot of a competition
    ///
    /// Skipped when nobody is subscribed; failures are logged only.
    pub async fn publish(&self, pool: &SqlitePool, competition_id: i64) {
        if self.hub.subscriber_count(competition_id) == 0 {
            debug!(competition_id, "No subscribers, snapshot not built");
            self.release_gate(competition_id);
            return;
        }

        let gate = self.gate(competition_id);
        let guard = gate.lock().await;

        let snapshot = match pool.acquire().await {
            Ok(mut conn) => build_snapshot(&mut conn, competition_id).await,
            Err(e) => Err(e.into()),
        };

        match snapshot {
            Ok(snapshot) => {
                let delivered = self
                    .hub
                    .publish(competition_id, ResultsEvent::ResultsUpdated { snapshot });
                debug!(competition_id, delivered, "Results snapshot published");
            }
            Err(e) => {
                warn!(competition_id, "Failed to build results snapshot: {}", e);
            }
        }

        drop(guard);
        drop(gate);
        self.release_gate(competition_id);
    }

    /// Push a standalone event without rebuilding the snapshot
    pub fn notify(&self, competition_id: i64, event: ResultsEvent) {
        let delivered = self.hub.publish(competition_id, event);
        debug!(competition_id, delivered, "Event published");
    }
}
