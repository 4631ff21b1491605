//! Score calculator
//!
//! Per boulder a top is worth 25 points and a zone 10, minus 0.1 for every
//! attempt after the first. A topped boulder scores the top value only; a
//! zone-only boulder scores the zone value. Arithmetic runs in integer tenths
//! of a point so totals are exact at one decimal and equal totals compare
//! equal.

use crate::db;
use bloc_common::db::{Climb, ClimberRoundScore};
use bloc_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::debug;

/// Points for a top, in tenths
pub const TOP_POINTS_TENTHS: i64 = 250;

/// Points for a zone, in tenths
pub const ZONE_POINTS_TENTHS: i64 = 100;

/// Deduction per attempt after the first, in tenths
pub const ATTEMPT_PENALTY_TENTHS: i64 = 1;

/// Upper bound for a recorded attempt count
pub const MAX_ATTEMPTS: i64 = 10_000;

/// What a judge records for one climber on one boulder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClimbOutcome {
    #[serde(default)]
    pub attempts_zone: i64,
    #[serde(default)]
    pub zone_reached: bool,
    #[serde(default)]
    pub attempts_top: i64,
    #[serde(default)]
    pub top_reached: bool,
}

impl ClimbOutcome {
    /// Attempt counts lie in `0..=MAX_ATTEMPTS`, and are at least 1 for
    /// anything reached
    pub fn validate(&self) -> Result<()> {
        if self.attempts_zone < 0 || self.attempts_top < 0 {
            return Err(Error::InvalidInput(
                "Attempt counts must not be negative".to_string(),
            ));
        }
        if self.attempts_zone > MAX_ATTEMPTS || self.attempts_top > MAX_ATTEMPTS {
            return Err(Error::InvalidInput(format!(
                "Attempt counts must not exceed {}",
                MAX_ATTEMPTS
            )));
        }
        if self.top_reached && self.attempts_top < 1 {
            return Err(Error::InvalidInput(
                "A reached top needs at least one attempt".to_string(),
            ));
        }
        if self.zone_reached && self.attempts_zone < 1 {
            return Err(Error::InvalidInput(
                "A reached zone needs at least one attempt".to_string(),
            ));
        }
        Ok(())
    }

    /// Contribution of this boulder in tenths of a point
    pub fn points_tenths(&self) -> i64 {
        if self.top_reached {
            TOP_POINTS_TENTHS - ATTEMPT_PENALTY_TENTHS * (self.attempts_top - 1)
        } else if self.zone_reached {
            ZONE_POINTS_TENTHS - ATTEMPT_PENALTY_TENTHS * (self.attempts_zone - 1)
        } else {
            0
        }
    }
}

impl From<&Climb> for ClimbOutcome {
    fn from(climb: &Climb) -> Self {
        Self {
            attempts_zone: climb.attempts_zone,
            zone_reached: climb.zone_reached,
            attempts_top: climb.attempts_top,
            top_reached: climb.top_reached,
        }
    }
}

/// Aggregate of one climber's climbs in one round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreAggregate {
    pub tops: i64,
    pub zones: i64,
    pub attempts_top: i64,
    pub attempts_zone: i64,
    pub total_tenths: i64,
}

impl ScoreAggregate {
    /// Total score rounded to one decimal
    pub fn total_score(&self) -> f64 {
        self.total_tenths as f64 / 10.0
    }

    pub fn to_round_score(&self, round_id: i64, climber_id: i64) -> ClimberRoundScore {
        ClimberRoundScore {
            round_id,
            climber_id,
            tops: self.tops,
            zones: self.zones,
            attempts_top: self.attempts_top,
            attempts_zone: self.attempts_zone,
            total_score: self.total_score(),
        }
    }
}

/// Convert a stored one-decimal score back to tenths
pub fn score_tenths(total_score: f64) -> i64 {
    (total_score * 10.0).round() as i64
}

/// Aggregate a set of outcomes; boulder order does not matter
pub fn calculate_score<'a, I>(outcomes: I) -> ScoreAggregate
where
    I: IntoIterator<Item = &'a ClimbOutcome>,
{
    outcomes
        .into_iter()
        .fold(ScoreAggregate::default(), |mut acc, outcome| {
            if outcome.top_reached {
                acc.tops += 1;
                acc.attempts_top += outcome.attempts_top;
            }
            if outcome.zone_reached {
                acc.zones += 1;
                acc.attempts_zone += outcome.attempts_zone;
            }
            acc.total_tenths += outcome.points_tenths();
            acc
        })
}

/// Recompute and store a climber's score in a round from their active climbs
///
/// The row is rebuilt in full every time; a climber without climbs gets an
/// all-zero row.
pub async fn recompute_score(
    conn: &mut SqliteConnection,
    round_id: i64,
    climber_id: i64,
) -> Result<ClimberRoundScore> {
    let climbs = db::get_active_climbs(&mut *conn, round_id, climber_id).await?;
    let outcomes: Vec<ClimbOutcome> = climbs
        .iter()
        .filter(|c| !c.deleted)
        .map(ClimbOutcome::from)
        .collect();
    let aggregate = calculate_score(&outcomes);

    debug!(
        round_id,
        climber_id,
        climbs = outcomes.len(),
        tops = aggregate.tops,
        zones = aggregate.zones,
        total = aggregate.total_score(),
        "Recomputed climber score"
    );

    db::upsert_climber_round_score(&mut *conn, round_id, climber_id, &aggregate).await
}
