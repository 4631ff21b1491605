//! Rank resolver
//!
//! Ranks a round by descending total score using standard competition
//! ranking (1, 2, 2, 4). Climbers tied on score are separated by their rank
//! in the previous round of the category; if they are tied there too, the
//! round before that decides, and so on. A tie that survives every earlier
//! round is kept as a shared rank. A climber without a rank in the compared
//! round sorts below every climber who has one.

use crate::db;
use crate::scoring::{self, score_tenths};
use bloc_common::db::RoundResult;
use bloc_common::Result;
use sqlx::SqliteConnection;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Climber id → rank in one earlier round
pub type RoundRanks = HashMap<i64, i64>;

/// Score of one climber, in tenths of a point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankInput {
    pub climber_id: i64,
    pub score_tenths: i64,
}

/// Assign ranks to every climber in `scores`
///
/// `history` holds earlier rounds, most recent first. The result is ordered
/// by rank, then climber id, and does not depend on the input order.
pub fn resolve_ranks(scores: &[RankInput], history: &[RoundRanks]) -> Vec<(i64, i64)> {
    let mut ordered = scores.to_vec();
    ordered.sort_by(|a, b| {
        b.score_tenths
            .cmp(&a.score_tenths)
            .then(a.climber_id.cmp(&b.climber_id))
    });

    let mut tiers: Vec<Vec<i64>> = Vec::new();
    for same_score in ordered.chunk_by(|a, b| a.score_tenths == b.score_tenths) {
        let tied: Vec<i64> = same_score.iter().map(|s| s.climber_id).collect();
        tiers.extend(break_ties(tied, history));
    }

    let mut ranks = Vec::with_capacity(scores.len());
    let mut position = 0i64;
    for tier in tiers {
        let rank = position + 1;
        position += tier.len() as i64;
        ranks.extend(tier.into_iter().map(|climber_id| (climber_id, rank)));
    }
    ranks
}

/// Split a group of score-tied climbers into ordered tiers
///
/// Each recursion step consumes one round of history, so the depth is
/// bounded by `history.len()`.
fn break_ties(mut tied: Vec<i64>, history: &[RoundRanks]) -> Vec<Vec<i64>> {
    tied.sort_unstable();
    let Some((previous, earlier)) = history.split_first() else {
        return vec![tied];
    };
    if tied.len() < 2 {
        return vec![tied];
    }

    // (0, rank) for ranked climbers, (1, 0) for the unranked
    let key = |climber_id: &i64| match previous.get(climber_id) {
        Some(rank) => (0u8, *rank),
        None => (1u8, 0),
    };
    tied.sort_by_key(|climber_id| (key(climber_id), *climber_id));

    tied.chunk_by(|a, b| key(a) == key(b))
        .flat_map(|group| break_ties(group.to_vec(), earlier))
        .collect()
}

/// Rank history for `round_id`: earlier rounds of its category, most recent first
pub async fn load_rank_history(
    conn: &mut SqliteConnection,
    round_id: i64,
) -> Result<Vec<RoundRanks>> {
    let round = db::get_round(&mut *conn, round_id).await?;
    let rounds = db::get_rounds_in_category(&mut *conn, round.category_id).await?;

    let mut history = Vec::new();
    for earlier in rounds
        .iter()
        .rev()
        .filter(|r| r.round_order < round.round_order)
    {
        history.push(db::ranks_for_round(&mut *conn, earlier.id).await?);
    }
    Ok(history)
}

/// Recompute the ranks of every scored climber in a round
///
/// Nothing is ranked until the round has at least one score. Once it has,
/// start-list climbers without climbs receive a zero score so they rank last
/// instead of being left out.
pub async fn recompute_ranks(conn: &mut SqliteConnection, round_id: i64) -> Result<Vec<RoundResult>> {
    let mut scores = db::get_round_scores(&mut *conn, round_id).await?;
    if scores.is_empty() {
        debug!(round_id, "No scores yet, ranks stay empty");
        return db::get_round_results(&mut *conn, round_id).await;
    }

    let scored: HashSet<i64> = scores.iter().map(|s| s.climber_id).collect();
    for entry in db::get_start_list(&mut *conn, round_id).await? {
        if !scored.contains(&entry.climber_id) {
            scores.push(scoring::recompute_score(&mut *conn, round_id, entry.climber_id).await?);
        }
    }

    let history = load_rank_history(&mut *conn, round_id).await?;
    let inputs: Vec<RankInput> = scores
        .iter()
        .map(|s| RankInput {
            climber_id: s.climber_id,
            score_tenths: score_tenths(s.total_score),
        })
        .collect();

    let ranks = resolve_ranks(&inputs, &history);
    for (climber_id, rank) in &ranks {
        db::upsert_round_result(&mut *conn, round_id, *climber_id, Some(*rank)).await?;
    }

    info!(
        round_id,
        climbers = ranks.len(),
        history_rounds = history.len(),
        "Ranks recomputed"
    );

    db::get_round_results(&mut *conn, round_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(climber_id: i64, score_tenths: i64) -> RankInput {
        RankInput {
            climber_id,
            score_tenths,
        }
    }

    fn history(rounds: &[&[(i64, i64)]]) -> Vec<RoundRanks> {
        rounds
            .iter()
            .map(|r| r.iter().copied().collect())
            .collect()
    }

    fn rank_of(ranks: &[(i64, i64)], climber_id: i64) -> i64 {
        ranks
            .iter()
            .find(|(id, _)| *id == climber_id)
            .map(|(_, rank)| *rank)
            .unwrap()
    }

    #[test]
    fn test_standard_competition_ranking() {
        let scores = [input(1, 500), input(2, 400), input(3, 400), input(4, 300)];
        let ranks = resolve_ranks(&scores, &[]);

        assert_eq!(ranks, vec![(1, 1), (2, 2), (3, 2), (4, 4)]);
    }

    #[test]
    fn test_first_round_ties_are_shared() {
        let scores = [input(5, 347), input(9, 347), input(2, 347)];
        let ranks = resolve_ranks(&scores, &[]);

        assert!(ranks.iter().all(|(_, rank)| *rank == 1));
    }

    #[test]
    fn test_tie_broken_by_previous_round() {
        // A (1) ranked 1st and B (2) ranked 2nd in round 1; tied at 34.7 now
        let scores = [input(2, 347), input(1, 347)];
        let ranks = resolve_ranks(&scores, &history(&[&[(1, 1), (2, 2)]]));

        assert_eq!(ranks, vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn test_tie_recurses_to_earlier_rounds() {
        let scores = [input(1, 200), input(2, 200), input(3, 200)];
        // Previous round: 1 and 2 share rank 3, 3 is 1st. Round before: 2 beat 1.
        let hist = history(&[&[(1, 3), (2, 3), (3, 1)], &[(1, 5), (2, 4), (3, 9)]]);
        let ranks = resolve_ranks(&scores, &hist);

        assert_eq!(rank_of(&ranks, 3), 1);
        assert_eq!(rank_of(&ranks, 2), 2);
        assert_eq!(rank_of(&ranks, 1), 3);
    }

    #[test]
    fn test_tie_stands_when_history_exhausted() {
        let scores = [input(1, 100), input(2, 100), input(3, 50)];
        let hist = history(&[&[(1, 2), (2, 2)], &[(1, 7), (2, 7)]]);
        let ranks = resolve_ranks(&scores, &hist);

        assert_eq!(ranks, vec![(1, 1), (2, 1), (3, 3)]);
    }

    #[test]
    fn test_missing_prior_result_ranks_worst() {
        let scores = [input(1, 100), input(2, 100), input(3, 100)];
        // Climber 1 did not take part in the previous round
        let hist = history(&[&[(2, 40), (3, 12)]]);
        let ranks = resolve_ranks(&scores, &hist);

        assert_eq!(ranks, vec![(3, 1), (2, 2), (1, 3)]);
    }

    #[test]
    fn test_unranked_climbers_can_be_split_by_earlier_round() {
        let scores = [input(1, 100), input(2, 100)];
        let hist = history(&[&[], &[(1, 8), (2, 3)]]);
        let ranks = resolve_ranks(&scores, &hist);

        assert_eq!(ranks, vec![(2, 1), (1, 2)]);
    }

    #[test]
    fn test_rank_after_tied_group_skips_group_size() {
        let scores = [
            input(1, 900),
            input(2, 800),
            input(3, 800),
            input(4, 800),
            input(5, 100),
        ];
        let ranks = resolve_ranks(&scores, &[]);

        assert_eq!(rank_of(&ranks, 2), 2);
        assert_eq!(rank_of(&ranks, 5), 2 + 3);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let hist = history(&[&[(1, 2), (2, 1), (3, 3), (4, 4)]]);
        let a = [input(1, 300), input(2, 300), input(3, 100), input(4, 100)];
        let b = [input(4, 100), input(2, 300), input(3, 100), input(1, 300)];

        assert_eq!(resolve_ranks(&a, &hist), resolve_ranks(&b, &hist));
    }

    #[test]
    fn test_empty_round() {
        assert!(resolve_ranks(&[], &[]).is_empty());
    }
}
