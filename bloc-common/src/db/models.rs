//! Database models
//!
//! Row types for the scoring tables. Ids are SQLite integer row ids.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Competition {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub competition_id: i64,
    pub name: String,
}

/// One stage of a category (qualification, semifinal, final)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Round {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    /// Position of the round within its category (ascending)
    pub round_order: i64,
    /// How many climbers the previous round passes into this one
    pub climbers_advance: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Climber {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Boulder {
    pub id: i64,
    pub round_id: i64,
    pub boulder_order: i64,
}

/// One attempt record for a (climber, boulder) pair
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Climb {
    pub id: i64,
    pub climber_id: i64,
    pub boulder_id: i64,
    pub attempts_zone: i64,
    pub zone_reached: bool,
    pub attempts_top: i64,
    pub top_reached: bool,
    /// Soft-delete flag; retracted climbs are never removed
    pub deleted: bool,
}

/// Aggregated score of one climber in one round
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ClimberRoundScore {
    pub round_id: i64,
    pub climber_id: i64,
    pub tops: i64,
    pub zones: i64,
    /// Attempts summed over topped boulders
    pub attempts_top: i64,
    /// Attempts summed over zoned boulders
    pub attempts_zone: i64,
    pub total_score: f64,
}

/// Start list entry and rank of one climber in one round
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct RoundResult {
    pub id: i64,
    pub round_id: i64,
    pub climber_id: i64,
    /// None until the round has scores
    pub rank: Option<i64>,
    pub start_order: i64,
    pub start_time: Option<String>,
}
