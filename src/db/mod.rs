mod models;

pub use models::*;

use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

pub type DbPool = SqlitePool;

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        // Strip SQL comment lines (lines starting with --)
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

pub async fn init(data_dir: &Path) -> Result<DbPool> {
    let db_path = data_dir.join("pitchrocket.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    info!("Initializing database at {}", db_path.display());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    // Enable WAL mode for better concurrency
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

async fn table_exists(pool: &SqlitePool, name: &str) -> Result<bool> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name=?")
            .bind(name)
            .fetch_optional(pool)
            .await?;
    Ok(row.is_some())
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: Users and sessions
    execute_sql(pool, include_str!("../../migrations/001_users.sql")).await?;

    // Migration 002: Templates
    if !table_exists(pool, "templates").await? {
        execute_sql(pool, include_str!("../../migrations/002_templates.sql")).await?;
    }

    // Migration 003: User lessons
    if !table_exists(pool, "user_lessons").await? {
        execute_sql(pool, include_str!("../../migrations/003_user_lessons.sql")).await?;
    }

    // Migration 004: Pitches
    if !table_exists(pool, "pitches").await? {
        execute_sql(pool, include_str!("../../migrations/004_pitches.sql")).await?;
    }

    // Migration 005: Transactions
    if !table_exists(pool, "transactions").await? {
        execute_sql(pool, include_str!("../../migrations/005_transactions.sql")).await?;
    }

    info!("Migrations completed");
    Ok(())
}

/// In-memory database with the full schema, for tests.
#[cfg(test)]
pub async fn test_pool() -> DbPool {
    // A single connection keeps every query on the same in-memory database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .expect("enable foreign keys");

    run_migrations(&pool).await.expect("migrations");
    pool
}
