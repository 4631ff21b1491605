//! Shared fixtures for bloc-sr integration tests

#![allow(dead_code)]

use bloc_common::db::init_memory_database;
use bloc_common::ResultsHub;
use bloc_sr::pipeline::{ClimbSubmission, ScoringService};
use bloc_sr::scoring::ClimbOutcome;
use bloc_sr::AppState;
use sqlx::SqlitePool;
use std::sync::Arc;

/// A competition with one category and a qualification → final chain
pub struct Fixture {
    pub db: SqlitePool,
    pub state: AppState,
    pub competition_id: i64,
    pub category_id: i64,
    pub qualification_id: i64,
    pub final_id: i64,
    /// Boulders of the qualification round, in order
    pub boulders: Vec<i64>,
}

impl Fixture {
    /// Qualification with `boulder_count` boulders; `final_quota` climbers advance
    pub async fn new(boulder_count: i64, final_quota: i64) -> Self {
        let db = init_memory_database().await.expect("memory database");

        let competition_id = insert(&db, "INSERT INTO competitions (name) VALUES ('Spring Bloc')").await;
        let category_id = sqlx::query("INSERT INTO categories (competition_id, name) VALUES (?, 'Open')")
            .bind(competition_id)
            .execute(&db)
            .await
            .unwrap()
            .last_insert_rowid();

        let qualification_id = add_round(&db, category_id, "Qualification", 1, 0).await;
        let final_id = add_round(&db, category_id, "Final", 2, final_quota).await;

        let mut boulders = Vec::new();
        for order in 1..=boulder_count {
            boulders.push(add_boulder(&db, qualification_id, order).await);
        }

        let hub = ResultsHub::new(16);
        let state = AppState::new(db.clone(), hub, 1000);

        Self {
            db,
            state,
            competition_id,
            category_id,
            qualification_id,
            final_id,
            boulders,
        }
    }

    pub fn service(&self) -> &ScoringService {
        &self.state.service
    }

    pub fn hub(&self) -> &Arc<ResultsHub> {
        self.state.service.broadcaster().hub()
    }

    pub async fn add_climber(&self, name: &str) -> i64 {
        sqlx::query("INSERT INTO climbers (name) VALUES (?)")
            .bind(name)
            .execute(&self.db)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    pub async fn rank_of(&self, round_id: i64, climber_id: i64) -> Option<i64> {
        sqlx::query_scalar::<_, Option<i64>>(
            "SELECT rank FROM round_results WHERE round_id = ? AND climber_id = ? AND deleted = 0",
        )
        .bind(round_id)
        .bind(climber_id)
        .fetch_one(&self.db)
        .await
        .unwrap()
    }

    pub async fn total_score(&self, round_id: i64, climber_id: i64) -> f64 {
        sqlx::query_scalar::<_, f64>(
            "SELECT total_score FROM climber_round_scores WHERE round_id = ? AND climber_id = ?",
        )
        .bind(round_id)
        .bind(climber_id)
        .fetch_one(&self.db)
        .await
        .unwrap()
    }

    /// Record a top on `boulder_id`
    pub async fn top(&self, climber_id: i64, boulder_id: i64, attempts: i64) {
        self.submit(climber_id, boulder_id, top(attempts, 1)).await;
    }

    /// Record a zone (no top) on `boulder_id`
    pub async fn zone(&self, climber_id: i64, boulder_id: i64, attempts: i64) {
        self.submit(climber_id, boulder_id, zone(attempts)).await;
    }

    pub async fn submit(&self, climber_id: i64, boulder_id: i64, outcome: ClimbOutcome) {
        self.service()
            .submit_climb(ClimbSubmission {
                climber_id,
                boulder_id,
                outcome,
            })
            .await
            .expect("climb should be recorded");
    }
}

pub fn top(attempts_top: i64, attempts_zone: i64) -> ClimbOutcome {
    ClimbOutcome {
        attempts_zone,
        zone_reached: true,
        attempts_top,
        top_reached: true,
    }
}

pub fn zone(attempts_zone: i64) -> ClimbOutcome {
    ClimbOutcome {
        attempts_zone,
        zone_reached: true,
        ..Default::default()
    }
}

pub async fn add_round(
    db: &SqlitePool,
    category_id: i64,
    name: &str,
    round_order: i64,
    climbers_advance: i64,
) -> i64 {
    sqlx::query(
        "INSERT INTO rounds (category_id, name, round_order, climbers_advance) VALUES (?, ?, ?, ?)",
    )
    .bind(category_id)
    .bind(name)
    .bind(round_order)
    .bind(climbers_advance)
    .execute(db)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub async fn add_boulder(db: &SqlitePool, round_id: i64, boulder_order: i64) -> i64 {
    sqlx::query("INSERT INTO boulders (round_id, boulder_order) VALUES (?, ?)")
        .bind(round_id)
        .bind(boulder_order)
        .execute(db)
        .await
        .unwrap()
        .last_insert_rowid()
}

async fn insert(db: &SqlitePool, sql: &str) -> i64 {
    sqlx::query(sql).execute(db).await.unwrap().last_insert_rowid()
}
