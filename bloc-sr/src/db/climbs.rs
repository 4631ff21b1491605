//! Climb records
//!
//! A climb is never hard-deleted: retraction sets `deleted = 1`, and the
//! partial unique index keeps one active row per (climber, boulder).

use crate::scoring::ClimbOutcome;
use bloc_common::db::Climb;
use bloc_common::{Error, Result};
use sqlx::SqliteConnection;

const CLIMB_COLUMNS: &str =
    "id, climber_id, boulder_id, attempts_zone, zone_reached, attempts_top, top_reached, deleted";

/// Active climbs of one climber on the boulders of one round
pub async fn get_active_climbs(
    conn: &mut SqliteConnection,
    round_id: i64,
    climber_id: i64,
) -> Result<Vec<Climb>> {
    let rows = sqlx::query_as::<_, Climb>(
        r#"
        SELECT cl.id, cl.climber_id, cl.boulder_id, cl.attempts_zone, cl.zone_reached,
               cl.attempts_top, cl.top_reached, cl.deleted
        FROM climbs cl
        JOIN boulders b ON b.id = cl.boulder_id
        WHERE b.round_id = ? AND cl.climber_id = ? AND cl.deleted = 0
        ORDER BY b.boulder_order ASC
        "#,
    )
    .bind(round_id)
    .bind(climber_id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Fetch an active climb by id
pub async fn get_active_climb(conn: &mut SqliteConnection, climb_id: i64) -> Result<Climb> {
    sqlx::query_as::<_, Climb>(&format!(
        "SELECT {} FROM climbs WHERE id = ? AND deleted = 0",
        CLIMB_COLUMNS
    ))
    .bind(climb_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Climb {}", climb_id)))
}

/// Climbers with at least one active climb in a round
pub async fn climbers_with_active_climbs(
    conn: &mut SqliteConnection,
    round_id: i64,
) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT DISTINCT cl.climber_id
        FROM climbs cl
        JOIN boulders b ON b.id = cl.boulder_id
        WHERE b.round_id = ? AND cl.deleted = 0
        ORDER BY cl.climber_id
        "#,
    )
    .bind(round_id)
    .fetch_all(conn)
    .await?;

    Ok(ids)
}

/// Record the outcome for (climber, boulder)
///
/// Re-submission updates the existing active row instead of adding one.
pub async fn upsert_climb(
    conn: &mut SqliteConnection,
    climber_id: i64,
    boulder_id: i64,
    outcome: &ClimbOutcome,
) -> Result<Climb> {
    let updated = sqlx::query(
        r#"
        UPDATE climbs
        SET attempts_zone = ?, zone_reached = ?, attempts_top = ?, top_reached = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE climber_id = ? AND boulder_id = ? AND deleted = 0
        "#,
    )
    .bind(outcome.attempts_zone)
    .bind(outcome.zone_reached)
    .bind(outcome.attempts_top)
    .bind(outcome.top_reached)
    .bind(climber_id)
    .bind(boulder_id)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        sqlx::query(
            r#"
            INSERT INTO climbs (climber_id, boulder_id, attempts_zone, zone_reached,
                                attempts_top, top_reached)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(climber_id)
        .bind(boulder_id)
        .bind(outcome.attempts_zone)
        .bind(outcome.zone_reached)
        .bind(outcome.attempts_top)
        .bind(outcome.top_reached)
        .execute(&mut *conn)
        .await?;
    }

    let climb = sqlx::query_as::<_, Climb>(&format!(
        "SELECT {} FROM climbs WHERE climber_id = ? AND boulder_id = ? AND deleted = 0",
        CLIMB_COLUMNS
    ))
    .bind(climber_id)
    .bind(boulder_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(climb)
}

/// Retract an active climb
pub async fn soft_delete_climb(conn: &mut SqliteConnection, climb_id: i64) -> Result<Climb> {
    let result = sqlx::query(
        "UPDATE climbs SET deleted = 1, updated_at = CURRENT_TIMESTAMP WHERE id = ? AND deleted = 0",
    )
    .bind(climb_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Climb {}", climb_id)));
    }

    let climb = sqlx::query_as::<_, Climb>(&format!(
        "SELECT {} FROM climbs WHERE id = ?",
        CLIMB_COLUMNS
    ))
    .bind(climb_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(climb)
}
