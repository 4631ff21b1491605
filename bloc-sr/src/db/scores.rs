//! Climber round scores

use crate::scoring::ScoreAggregate;
use bloc_common::db::ClimberRoundScore;
use bloc_common::Result;
use sqlx::SqliteConnection;

/// Replace the stored score of (round, climber) with `aggregate`
pub async fn upsert_climber_round_score(
    conn: &mut SqliteConnection,
    round_id: i64,
    climber_id: i64,
    aggregate: &ScoreAggregate,
) -> Result<ClimberRoundScore> {
    sqlx::query(
        r#"
        INSERT INTO climber_round_scores
            (round_id, climber_id, tops, zones, attempts_top, attempts_zone, total_score)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (round_id, climber_id) DO UPDATE SET
            tops = excluded.tops,
            zones = excluded.zones,
            attempts_top = excluded.attempts_top,
            attempts_zone = excluded.attempts_zone,
            total_score = excluded.total_score,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(round_id)
    .bind(climber_id)
    .bind(aggregate.tops)
    .bind(aggregate.zones)
    .bind(aggregate.attempts_top)
    .bind(aggregate.attempts_zone)
    .bind(aggregate.total_score())
    .execute(&mut *conn)
    .await?;

    Ok(aggregate.to_round_score(round_id, climber_id))
}

/// All scores stored for a round, ordered by climber id
pub async fn get_round_scores(
    conn: &mut SqliteConnection,
    round_id: i64,
) -> Result<Vec<ClimberRoundScore>> {
    let rows = sqlx::query_as::<_, ClimberRoundScore>(
        r#"
        SELECT round_id, climber_id, tops, zones, attempts_top, attempts_zone, total_score
        FROM climber_round_scores
        WHERE round_id = ?
        ORDER BY climber_id
        "#,
    )
    .bind(round_id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}
