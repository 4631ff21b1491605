//! Round, category and entity lookups

use bloc_common::db::{Boulder, Category, Climber, Competition, Round};
use bloc_common::{Error, Result};
use sqlx::SqliteConnection;

pub async fn get_competition(conn: &mut SqliteConnection, competition_id: i64) -> Result<Competition> {
    sqlx::query_as::<_, Competition>("SELECT id, name FROM competitions WHERE id = ?")
        .bind(competition_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Competition {}", competition_id)))
}

/// Categories of a competition, ordered by id
pub async fn get_categories_for_competition(
    conn: &mut SqliteConnection,
    competition_id: i64,
) -> Result<Vec<Category>> {
    let rows = sqlx::query_as::<_, Category>(
        "SELECT id, competition_id, name FROM categories WHERE competition_id = ? ORDER BY id",
    )
    .bind(competition_id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

pub async fn get_round(conn: &mut SqliteConnection, round_id: i64) -> Result<Round> {
    sqlx::query_as::<_, Round>(
        "SELECT id, category_id, name, round_order, climbers_advance FROM rounds WHERE id = ?",
    )
    .bind(round_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Round {}", round_id)))
}

/// All rounds of a category, ordered by round order ascending
pub async fn get_rounds_in_category(
    conn: &mut SqliteConnection,
    category_id: i64,
) -> Result<Vec<Round>> {
    let rows = sqlx::query_as::<_, Round>(
        r#"
        SELECT id, category_id, name, round_order, climbers_advance
        FROM rounds
        WHERE category_id = ?
        ORDER BY round_order ASC
        "#,
    )
    .bind(category_id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// The round immediately after `round` in its category
pub async fn get_next_round(conn: &mut SqliteConnection, round: &Round) -> Result<Option<Round>> {
    let row = sqlx::query_as::<_, Round>(
        r#"
        SELECT id, category_id, name, round_order, climbers_advance
        FROM rounds
        WHERE category_id = ? AND round_order > ?
        ORDER BY round_order ASC
        LIMIT 1
        "#,
    )
    .bind(round.category_id)
    .bind(round.round_order)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

pub async fn competition_id_for_round(conn: &mut SqliteConnection, round_id: i64) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT c.competition_id
        FROM rounds r
        JOIN categories c ON c.id = r.category_id
        WHERE r.id = ?
        "#,
    )
    .bind(round_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Round {}", round_id)))
}

pub async fn get_boulder(conn: &mut SqliteConnection, boulder_id: i64) -> Result<Boulder> {
    sqlx::query_as::<_, Boulder>("SELECT id, round_id, boulder_order FROM boulders WHERE id = ?")
        .bind(boulder_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Boulder {}", boulder_id)))
}

pub async fn get_climber(conn: &mut SqliteConnection, climber_id: i64) -> Result<Climber> {
    sqlx::query_as::<_, Climber>("SELECT id, name FROM climbers WHERE id = ?")
        .bind(climber_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Climber {}", climber_id)))
}
