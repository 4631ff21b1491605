//! Database initialization
//!
//! Creates the SQLite database on first run and brings the schema up to date.
//! Every statement is idempotent, so startup can run it unconditionally.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// SQLite busy timeout applied to every pooled connection
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // WAL lets snapshot readers run alongside the single writer
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// Limited to one connection: every `sqlite::memory:` connection is a
/// separate database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_competitions_table(pool).await?;
    create_categories_table(pool).await?;
    create_rounds_table(pool).await?;
    create_climbers_table(pool).await?;
    create_boulders_table(pool).await?;
    create_climbs_table(pool).await?;
    create_climber_round_scores_table(pool).await?;
    create_round_results_table(pool).await?;
    Ok(())
}

async fn create_competitions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS competitions (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_categories_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY,
            competition_id INTEGER NOT NULL REFERENCES competitions(id) ON DELETE CASCADE,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Rounds are ordered by `round_order` within a category
async fn create_rounds_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rounds (
            id INTEGER PRIMARY KEY,
            category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            round_order INTEGER NOT NULL,
            climbers_advance INTEGER NOT NULL DEFAULT 0 CHECK (climbers_advance >= 0),
            UNIQUE (category_id, round_order)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_climbers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS climbers (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_boulders_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS boulders (
            id INTEGER PRIMARY KEY,
            round_id INTEGER NOT NULL REFERENCES rounds(id) ON DELETE CASCADE,
            boulder_order INTEGER NOT NULL,
            UNIQUE (round_id, boulder_order)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// At most one active climb per (climber, boulder)
async fn create_climbs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS climbs (
            id INTEGER PRIMARY KEY,
            climber_id INTEGER NOT NULL REFERENCES climbers(id),
            boulder_id INTEGER NOT NULL REFERENCES boulders(id),
            attempts_zone INTEGER NOT NULL DEFAULT 0,
            zone_reached INTEGER NOT NULL DEFAULT 0,
            attempts_top INTEGER NOT NULL DEFAULT 0,
            top_reached INTEGER NOT NULL DEFAULT 0,
            deleted INTEGER NOT NULL DEFAULT 0,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_climbs_active
        ON climbs (climber_id, boulder_id) WHERE deleted = 0
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_climber_round_scores_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS climber_round_scores (
            round_id INTEGER NOT NULL REFERENCES rounds(id) ON DELETE CASCADE,
            climber_id INTEGER NOT NULL REFERENCES climbers(id),
            tops INTEGER NOT NULL DEFAULT 0,
            zones INTEGER NOT NULL DEFAULT 0,
            attempts_top INTEGER NOT NULL DEFAULT 0,
            attempts_zone INTEGER NOT NULL DEFAULT 0,
            total_score REAL NOT NULL DEFAULT 0,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (round_id, climber_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Start order and climber are unique among active entries of a round
async fn create_round_results_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS round_results (
            id INTEGER PRIMARY KEY,
            round_id INTEGER NOT NULL REFERENCES rounds(id) ON DELETE CASCADE,
            climber_id INTEGER NOT NULL REFERENCES climbers(id),
            rank INTEGER,
            start_order INTEGER NOT NULL,
            start_time TEXT,
            deleted INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_round_results_climber
        ON round_results (round_id, climber_id) WHERE deleted = 0
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_round_results_start_order
        ON round_results (round_id, start_order) WHERE deleted = 0
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_database_has_schema() {
        let pool = init_memory_database().await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        for expected in [
            "boulders",
            "categories",
            "climber_round_scores",
            "climbers",
            "climbs",
            "competitions",
            "round_results",
            "rounds",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
        }
    }

    #[tokio::test]
    async fn test_create_schema_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        create_schema(&pool).await.unwrap();
        create_schema(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_active_climb_uniqueness() {
        let pool = init_memory_database().await.unwrap();
        sqlx::query("INSERT INTO competitions (id, name) VALUES (1, 'Open')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO categories (id, competition_id, name) VALUES (1, 1, 'Women')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO rounds (id, category_id, name, round_order) VALUES (1, 1, 'Q', 1)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO boulders (id, round_id, boulder_order) VALUES (1, 1, 1)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO climbers (id, name) VALUES (1, 'Ada')")
            .execute(&pool)
            .await
            .unwrap();

        let insert = "INSERT INTO climbs (climber_id, boulder_id, deleted) VALUES (1, 1, ?)";
        sqlx::query(insert).bind(0).execute(&pool).await.unwrap();
        assert!(sqlx::query(insert).bind(0).execute(&pool).await.is_err());

        // Retracted rows do not count against the active uniqueness
        sqlx::query(insert).bind(1).execute(&pool).await.unwrap();
        sqlx::query(insert).bind(1).execute(&pool).await.unwrap();
    }
}
