//! Round advancement selector
//!
//! Moves the best climbers of a round onto the start list of the next round
//! of the same category. The next round's `climbers_advance` is the quota; a
//! tie on the cutoff rank lets every climber sharing that rank through.

use crate::db;
use bloc_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use std::collections::HashSet;
use tracing::info;

/// Result of one advancement run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceOutcome {
    /// Climbers newly added to the next round
    pub advanced_count: usize,
    pub next_round_id: i64,
}

/// Pick the advancing climbers from `(climber_id, rank)` pairs sorted by rank
///
/// Returns at least `quota` climbers when that many are ranked, and more only
/// when the climber after the cutoff shares the cutoff rank.
pub fn select_advancing(ranked: &[(i64, i64)], quota: usize) -> &[(i64, i64)] {
    if quota == 0 {
        return &[];
    }
    if ranked.len() <= quota {
        return ranked;
    }

    let cutoff_rank = ranked[quota - 1].1;
    let tied_past_cutoff = ranked[quota..]
        .iter()
        .take_while(|(_, rank)| *rank == cutoff_rank)
        .count();

    &ranked[..quota + tied_past_cutoff]
}

/// Advance `round_id` into its successor round
///
/// Climbers already on the next start list are skipped, so re-running is a
/// no-op. New entries go after the current last start order in reverse rank
/// order: the best climber of this round starts last.
pub async fn advance(conn: &mut SqliteConnection, round_id: i64) -> Result<AdvanceOutcome> {
    let round = db::get_round(&mut *conn, round_id).await?;
    let next = db::get_next_round(&mut *conn, &round)
        .await?
        .ok_or_else(|| Error::InvalidState(format!("Round {} has no next round", round_id)))?;

    let mut ranked: Vec<(i64, i64)> = db::get_round_results(&mut *conn, round_id)
        .await?
        .into_iter()
        .filter_map(|r| r.rank.map(|rank| (r.climber_id, rank)))
        .collect();
    if ranked.is_empty() {
        return Err(Error::InvalidState(format!(
            "Round {} has no ranked results to advance",
            round_id
        )));
    }
    ranked.sort_by_key(|&(climber_id, rank)| (rank, climber_id));

    let quota = usize::try_from(next.climbers_advance).unwrap_or(0);
    let selected = select_advancing(&ranked, quota);

    let already: HashSet<i64> = db::get_start_list(&mut *conn, next.id)
        .await?
        .into_iter()
        .map(|entry| entry.climber_id)
        .collect();
    let newcomers: Vec<i64> = selected
        .iter()
        .map(|&(climber_id, _)| climber_id)
        .filter(|climber_id| !already.contains(climber_id))
        .collect();

    let mut start_order = db::max_start_order(&mut *conn, next.id).await?;
    for climber_id in newcomers.iter().rev() {
        start_order += 1;
        db::add_start_list_entry(&mut *conn, next.id, *climber_id, start_order, None).await?;
    }

    info!(
        round_id,
        next_round_id = next.id,
        quota,
        selected = selected.len(),
        advanced = newcomers.len(),
        "Round advanced"
    );

    Ok(AdvanceOutcome {
        advanced_count: newcomers.len(),
        next_round_id: next.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(ranks: &[i64]) -> Vec<(i64, i64)> {
        ranks
            .iter()
            .enumerate()
            .map(|(i, rank)| (i as i64 + 1, *rank))
            .collect()
    }

    #[test]
    fn test_distinct_ranks_take_exactly_quota() {
        let field = ranked(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(select_advancing(&field, 8).len(), 8);
    }

    #[test]
    fn test_tie_on_cutoff_takes_everyone_tied() {
        // Ranks 1-7 distinct, 8th and 9th share rank 8
        let field = ranked(&[1, 2, 3, 4, 5, 6, 7, 8, 8, 10]);
        let selected = select_advancing(&field, 8);

        assert_eq!(selected.len(), 9);
        assert_eq!(selected.last(), Some(&(9, 8)));
    }

    #[test]
    fn test_tie_above_cutoff_does_not_extend() {
        let field = ranked(&[1, 2, 2, 4, 5]);
        assert_eq!(select_advancing(&field, 3).len(), 3);
    }

    #[test]
    fn test_tie_straddling_cutoff_from_above() {
        // Three-way tie for 2nd with a quota of 2
        let field = ranked(&[1, 2, 2, 2, 5]);
        assert_eq!(select_advancing(&field, 2).len(), 4);
    }

    #[test]
    fn test_quota_larger_than_field() {
        let field = ranked(&[1, 2, 3]);
        assert_eq!(select_advancing(&field, 8).len(), 3);
    }

    #[test]
    fn test_zero_quota() {
        let field = ranked(&[1, 2, 3]);
        assert!(select_advancing(&field, 0).is_empty());
    }
}
