//! Results snapshot delivered to subscribers and returned by the full-results query

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full results of one competition: category → round → ranked climbers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultsSnapshot {
    pub competition_id: i64,
    pub generated_at: DateTime<Utc>,
    /// Ordered by category id
    pub categories: Vec<CategoryResults>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryResults {
    pub category_id: i64,
    pub name: String,
    /// Ordered by round order ascending
    pub rounds: Vec<RoundResults>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundResults {
    pub round_id: i64,
    pub name: String,
    pub round_order: i64,
    /// Ordered by rank, unranked climbers last
    pub entries: Vec<RankedEntry>,
}

/// One line of a round's ranking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedEntry {
    pub rank: Option<i64>,
    pub climber_id: i64,
    pub climber_name: String,
    pub tops: i64,
    pub attempts_top: i64,
    pub zones: i64,
    pub attempts_zone: i64,
    pub total_score: f64,
}

impl ResultsSnapshot {
    /// Empty snapshot for a competition without categories
    pub fn empty(competition_id: i64) -> Self {
        Self {
            competition_id,
            generated_at: Utc::now(),
            categories: Vec::new(),
        }
    }

    /// Find a round anywhere in the snapshot
    pub fn round(&self, round_id: i64) -> Option<&RoundResults> {
        self.categories
            .iter()
            .flat_map(|c| c.rounds.iter())
            .find(|r| r.round_id == round_id)
    }
}
