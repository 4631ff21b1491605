//! Round results: start list entries and ranks

use bloc_common::db::RoundResult;
use bloc_common::{Error, Result};
use sqlx::SqliteConnection;
use std::collections::HashMap;

/// Active results of a round, ranked first (by rank), unranked after
pub async fn get_round_results(conn: &mut SqliteConnection, round_id: i64) -> Result<Vec<RoundResult>> {
    let rows = sqlx::query_as::<_, RoundResult>(
        r#"
        SELECT id, round_id, climber_id, rank, start_order, start_time
        FROM round_results
        WHERE round_id = ? AND deleted = 0
        ORDER BY rank IS NULL, rank ASC, climber_id ASC
        "#,
    )
    .bind(round_id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Active entries of a round in start order
pub async fn get_start_list(conn: &mut SqliteConnection, round_id: i64) -> Result<Vec<RoundResult>> {
    let rows = sqlx::query_as::<_, RoundResult>(
        r#"
        SELECT id, round_id, climber_id, rank, start_order, start_time
        FROM round_results
        WHERE round_id = ? AND deleted = 0
        ORDER BY start_order ASC
        "#,
    )
    .bind(round_id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Highest active start order in a round, 0 for an empty start list
pub async fn max_start_order(conn: &mut SqliteConnection, round_id: i64) -> Result<i64> {
    let max = sqlx::query_scalar::<_, Option<i64>>(
        "SELECT MAX(start_order) FROM round_results WHERE round_id = ? AND deleted = 0",
    )
    .bind(round_id)
    .fetch_one(conn)
    .await?;

    Ok(max.unwrap_or(0))
}

/// Climber → rank for every ranked climber of a round
pub async fn ranks_for_round(conn: &mut SqliteConnection, round_id: i64) -> Result<HashMap<i64, i64>> {
    let rows = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT climber_id, rank
        FROM round_results
        WHERE round_id = ? AND deleted = 0 AND rank IS NOT NULL
        "#,
    )
    .bind(round_id)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Set the rank of a climber in a round
///
/// A climber scored without being on the start list gets an entry appended
/// after the current last start order.
pub async fn upsert_round_result(
    conn: &mut SqliteConnection,
    round_id: i64,
    climber_id: i64,
    rank: Option<i64>,
) -> Result<()> {
    let updated = sqlx::query(
        "UPDATE round_results SET rank = ? WHERE round_id = ? AND climber_id = ? AND deleted = 0",
    )
    .bind(rank)
    .bind(round_id)
    .bind(climber_id)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        let start_order = max_start_order(&mut *conn, round_id).await? + 1;
        sqlx::query(
            "INSERT INTO round_results (round_id, climber_id, rank, start_order) VALUES (?, ?, ?, ?)",
        )
        .bind(round_id)
        .bind(climber_id)
        .bind(rank)
        .bind(start_order)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Add a climber to a round's start list with an unranked entry
///
/// Rejects a climber already on the list and a start order already taken.
pub async fn add_start_list_entry(
    conn: &mut SqliteConnection,
    round_id: i64,
    climber_id: i64,
    start_order: i64,
    start_time: Option<&str>,
) -> Result<RoundResult> {
    let existing = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT climber_id, start_order
        FROM round_results
        WHERE round_id = ? AND deleted = 0 AND (climber_id = ? OR start_order = ?)
        "#,
    )
    .bind(round_id)
    .bind(climber_id)
    .bind(start_order)
    .fetch_all(&mut *conn)
    .await?;

    if existing.iter().any(|(id, _)| *id == climber_id) {
        return Err(Error::InvalidState(format!(
            "Climber {} is already on the start list of round {}",
            climber_id, round_id
        )));
    }
    if !existing.is_empty() {
        return Err(Error::InvalidState(format!(
            "Start order {} is already taken in round {}",
            start_order, round_id
        )));
    }

    let result = sqlx::query(
        "INSERT INTO round_results (round_id, climber_id, start_order, start_time) VALUES (?, ?, ?, ?)",
    )
    .bind(round_id)
    .bind(climber_id)
    .bind(start_order)
    .bind(start_time)
    .execute(&mut *conn)
    .await?;

    Ok(RoundResult {
        id: result.last_insert_rowid(),
        round_id,
        climber_id,
        rank: None,
        start_order,
        start_time: start_time.map(str::to_string),
    })
}
