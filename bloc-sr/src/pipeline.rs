//! Scoring pipeline
//!
//! Each judge or organiser action runs as one straight-line sequence:
//! write → recompute score → recompute ranks → commit → publish.
//!
//! Writes to the same round are serialized by a round-scoped async mutex and
//! every sequence runs in a single SQLite transaction, so a half-finished
//! recompute is never visible. SQLite lock conflicts between different rounds
//! are retried transparently.

use crate::advancement::{self, AdvanceOutcome};
use crate::broadcast::Broadcaster;
use crate::db;
use crate::ranking;
use crate::scoring::{self, ClimbOutcome};
use bloc_common::db::{retry_on_lock, Climb, ClimberRoundScore, RoundResult};
use bloc_common::events::ResultsEvent;
use bloc_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;
use tracing::info;

/// Per-round mutual exclusion
#[derive(Default)]
pub struct RoundLocks {
    locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl RoundLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other writer holds `round_id`
    pub async fn lock(&self, round_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(round_id).or_default())
        };
        lock.lock_owned().await
    }
}

/// A judge's submission for one climber on one boulder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimbSubmission {
    pub climber_id: i64,
    pub boulder_id: i64,
    #[serde(flatten)]
    pub outcome: ClimbOutcome,
}

/// State of a round after a climb was recorded or retracted
#[derive(Debug, Clone, Serialize)]
pub struct ClimbUpdate {
    pub climb: Climb,
    pub round_id: i64,
    pub score: ClimberRoundScore,
    pub results: Vec<RoundResult>,
    #[serde(skip)]
    pub competition_id: i64,
}

/// Request to put a climber on a start list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartListRequest {
    pub climber_id: i64,
    /// Defaults to after the current last entry
    #[serde(default)]
    pub start_order: Option<i64>,
    #[serde(default)]
    pub start_time: Option<String>,
}

/// Entry point for every mutation of scores, ranks and start lists
pub struct ScoringService {
    db: SqlitePool,
    broadcaster: Arc<Broadcaster>,
    locks: RoundLocks,
    max_lock_wait_ms: u64,
}

impl ScoringService {
    pub fn new(db: SqlitePool, broadcaster: Arc<Broadcaster>, max_lock_wait_ms: u64) -> Self {
        Self {
            db,
            broadcaster,
            locks: RoundLocks::new(),
            max_lock_wait_ms,
        }
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Record (or overwrite) a climb and recompute its round
    pub async fn submit_climb(&self, submission: ClimbSubmission) -> Result<ClimbUpdate> {
        submission.outcome.validate()?;

        let round_id = {
            let mut conn = self.db.acquire().await?;
            db::get_boulder(&mut conn, submission.boulder_id).await?.round_id
        };

        let update = {
            let _guard = self.locks.lock(round_id).await;
            retry_on_lock("submit climb", self.max_lock_wait_ms, || {
                self.submit_climb_tx(&submission, round_id)
            })
            .await?
        };

        info!(
            round_id,
            climber_id = submission.climber_id,
            boulder_id = submission.boulder_id,
            total = update.score.total_score,
            "Climb recorded"
        );

        self.broadcaster.publish(&self.db, update.competition_id).await;
        Ok(update)
    }

    async fn submit_climb_tx(&self, submission: &ClimbSubmission, round_id: i64) -> Result<ClimbUpdate> {
        let mut tx = self.db.begin().await?;

        db::get_climber(&mut tx, submission.climber_id).await?;
        let climb = db::upsert_climb(
            &mut tx,
            submission.climber_id,
            submission.boulder_id,
            &submission.outcome,
        )
        .await?;
        let score = scoring::recompute_score(&mut tx, round_id, submission.climber_id).await?;
        let results = ranking::recompute_ranks(&mut tx, round_id).await?;
        let competition_id = db::competition_id_for_round(&mut tx, round_id).await?;

        tx.commit().await?;

        Ok(ClimbUpdate {
            climb,
            round_id,
            score,
            results,
            competition_id,
        })
    }

    /// Retract a climb and recompute its round
    pub async fn retract_climb(&self, climb_id: i64) -> Result<ClimbUpdate> {
        let round_id = {
            let mut conn = self.db.acquire().await?;
            let climb = db::get_active_climb(&mut conn, climb_id).await?;
            db::get_boulder(&mut conn, climb.boulder_id).await?.round_id
        };

        let update = {
            let _guard = self.locks.lock(round_id).await;
            retry_on_lock("retract climb", self.max_lock_wait_ms, || {
                self.retract_climb_tx(climb_id, round_id)
            })
            .await?
        };

        info!(
            round_id,
            climb_id,
            climber_id = update.climb.climber_id,
            "Climb retracted"
        );

        self.broadcaster.publish(&self.db, update.competition_id).await;
        Ok(update)
    }

    async fn retract_climb_tx(&self, climb_id: i64, round_id: i64) -> Result<ClimbUpdate> {
        let mut tx = self.db.begin().await?;

        let climb = db::soft_delete_climb(&mut tx, climb_id).await?;
        let score = scoring::recompute_score(&mut tx, round_id, climb.climber_id).await?;
        let results = ranking::recompute_ranks(&mut tx, round_id).await?;
        let competition_id = db::competition_id_for_round(&mut tx, round_id).await?;

        tx.commit().await?;

        Ok(ClimbUpdate {
            climb,
            round_id,
            score,
            results,
            competition_id,
        })
    }

    /// Rebuild every score of a round from its raw climbs and re-rank
    pub async fn recompute_round(&self, round_id: i64) -> Result<Vec<RoundResult>> {
        let (results, competition_id) = {
            let _guard = self.locks.lock(round_id).await;
            retry_on_lock("recompute round", self.max_lock_wait_ms, || {
                self.recompute_round_tx(round_id)
            })
            .await?
        };

        self.broadcaster.publish(&self.db, competition_id).await;
        Ok(results)
    }

    async fn recompute_round_tx(&self, round_id: i64) -> Result<(Vec<RoundResult>, i64)> {
        let mut tx = self.db.begin().await?;

        db::get_round(&mut tx, round_id).await?;
        let mut climbers: BTreeSet<i64> = db::climbers_with_active_climbs(&mut tx, round_id)
            .await?
            .into_iter()
            .collect();
        climbers.extend(
            db::get_round_scores(&mut tx, round_id)
                .await?
                .into_iter()
                .map(|s| s.climber_id),
        );

        for climber_id in &climbers {
            scoring::recompute_score(&mut tx, round_id, *climber_id).await?;
        }
        let results = ranking::recompute_ranks(&mut tx, round_id).await?;
        let competition_id = db::competition_id_for_round(&mut tx, round_id).await?;

        tx.commit().await?;

        info!(round_id, climbers = climbers.len(), "Round recomputed");
        Ok((results, competition_id))
    }

    /// Move the qualifying climbers of a round into the next round
    pub async fn advance_round(&self, round_id: i64) -> Result<AdvanceOutcome> {
        let next_round_id = {
            let mut conn = self.db.acquire().await?;
            let round = db::get_round(&mut conn, round_id).await?;
            db::get_next_round(&mut conn, &round)
                .await?
                .ok_or_else(|| Error::InvalidState(format!("Round {} has no next round", round_id)))?
                .id
        };

        // Round order ascends along the lock chain, so this cannot deadlock
        let (outcome, competition_id) = {
            let _source = self.locks.lock(round_id).await;
            let _target = self.locks.lock(next_round_id).await;
            retry_on_lock("advance round", self.max_lock_wait_ms, || {
                self.advance_round_tx(round_id)
            })
            .await?
        };

        if outcome.advanced_count > 0 {
            self.broadcaster.notify(
                competition_id,
                ResultsEvent::RoundAdvanced {
                    round_id,
                    next_round_id: outcome.next_round_id,
                    advanced_count: outcome.advanced_count,
                    timestamp: chrono::Utc::now(),
                },
            );
            self.broadcaster.publish(&self.db, competition_id).await;
        }

        Ok(outcome)
    }

    async fn advance_round_tx(&self, round_id: i64) -> Result<(AdvanceOutcome, i64)> {
        let mut tx = self.db.begin().await?;

        let outcome = advancement::advance(&mut tx, round_id).await?;
        if outcome.advanced_count > 0 {
            // Newcomers to an already scored round rank last right away
            ranking::recompute_ranks(&mut tx, outcome.next_round_id).await?;
        }
        let competition_id = db::competition_id_for_round(&mut tx, round_id).await?;

        tx.commit().await?;
        Ok((outcome, competition_id))
    }

    /// Add a climber to a round's start list
    pub async fn add_start_list_entry(
        &self,
        round_id: i64,
        request: StartListRequest,
    ) -> Result<RoundResult> {
        if matches!(request.start_order, Some(order) if order < 1) {
            return Err(Error::InvalidInput(
                "Start order must be at least 1".to_string(),
            ));
        }

        let (entry, competition_id) = {
            let _guard = self.locks.lock(round_id).await;
            retry_on_lock("add start list entry", self.max_lock_wait_ms, || {
                self.add_start_list_entry_tx(round_id, &request)
            })
            .await?
        };

        info!(
            round_id,
            climber_id = entry.climber_id,
            start_order = entry.start_order,
            "Start list entry added"
        );

        self.broadcaster.publish(&self.db, competition_id).await;
        Ok(entry)
    }

    async fn add_start_list_entry_tx(
        &self,
        round_id: i64,
        request: &StartListRequest,
    ) -> Result<(RoundResult, i64)> {
        let mut tx = self.db.begin().await?;

        db::get_round(&mut tx, round_id).await?;
        db::get_climber(&mut tx, request.climber_id).await?;
        let start_order = match request.start_order {
            Some(order) => order,
            None => db::max_start_order(&mut tx, round_id).await? + 1,
        };
        let mut entry = db::add_start_list_entry(
            &mut tx,
            round_id,
            request.climber_id,
            start_order,
            request.start_time.as_deref(),
        )
        .await?;
        // A round that already has scores ranks the newcomer last at once
        let results = ranking::recompute_ranks(&mut tx, round_id).await?;
        if let Some(ranked) = results.into_iter().find(|r| r.id == entry.id) {
            entry = ranked;
        }
        let competition_id = db::competition_id_for_round(&mut tx, round_id).await?;

        tx.commit().await?;
        Ok((entry, competition_id))
    }
}
