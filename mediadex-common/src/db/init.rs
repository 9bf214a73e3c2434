//! Database initialization
//!
//! The cache database is created on first run. Schema creation is
//! idempotent, so opening an existing database is always safe.

use crate::{Medium, Result};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (creating if needed) the cache database and its tables
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new cache database: {}", db_path.display());
    } else {
        info!("Opened existing cache database: {}", db_path.display());
    }

    // WAL lets lookups proceed while a write-back is in flight
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_cache_tables(&pool).await?;

    Ok(pool)
}

/// Private in-memory database with the cache schema.
///
/// Limited to one connection: every `:memory:` connection is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    create_cache_tables(&pool).await?;
    Ok(pool)
}

/// Create every cache table
pub async fn create_cache_tables(pool: &SqlitePool) -> Result<()> {
    create_lookup_table(pool).await?;
    create_lookup_miss_table(pool).await?;
    create_title_alias_table(pool).await?;
    for medium in Medium::ALL {
        create_payload_table(pool, medium).await?;
    }
    Ok(())
}

/// Name → identifier mappings, one row per (name, medium, source)
async fn create_lookup_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lookup (
            name_key TEXT NOT NULL,
            name TEXT NOT NULL,
            medium INTEGER NOT NULL,
            source INTEGER NOT NULL,
            identifier TEXT NOT NULL,
            PRIMARY KEY (name_key, medium, source)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Recent "no match" answers, expired with the payload TTL
async fn create_lookup_miss_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lookup_miss (
            name_key TEXT NOT NULL,
            medium INTEGER NOT NULL,
            source INTEGER NOT NULL,
            searched_names TEXT NOT NULL DEFAULT '[]',
            cached_at INTEGER NOT NULL,
            PRIMARY KEY (name_key, medium, source)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_title_alias_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS title_alias (
            identifier TEXT NOT NULL,
            medium INTEGER NOT NULL,
            title TEXT NOT NULL,
            PRIMARY KEY (identifier, medium)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_payload_table(pool: &SqlitePool, medium: Medium) -> Result<()> {
    let table = medium.payload_table();
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            identifier TEXT NOT NULL,
            source INTEGER NOT NULL,
            payload TEXT NOT NULL,
            cached_at INTEGER NOT NULL,
            PRIMARY KEY (identifier, source)
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_cached_at ON {table}(cached_at)"
    ))
    .execute(pool)
    .await?;

    Ok(())
}
