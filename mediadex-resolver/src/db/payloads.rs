//! Per-source payload cache with lazy expiry
//!
//! A payload is served while `now - cached_at < ttl`. The first read that
//! finds an older row deletes it and reports a miss. Nothing sweeps the
//! tables in the background; see [`purge_expired`] for manual cleanup.

use super::unix_now;
use mediadex_common::{Medium, Result, Source};
use serde_json::Value;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::debug;

/// Read a payload as of `now` (unix seconds)
pub async fn get_payload_at(
    pool: &SqlitePool,
    identifier: &str,
    medium: Medium,
    source: Source,
    now: i64,
    ttl: Duration,
) -> Result<Option<Value>> {
    let table = medium.payload_table();
    let row: Option<(String, i64)> = sqlx::query_as(&format!(
        "SELECT payload, cached_at FROM {table} WHERE identifier = ? AND source = ?"
    ))
    .bind(identifier)
    .bind(source.code())
    .fetch_optional(pool)
    .await?;

    let Some((payload, cached_at)) = row else {
        return Ok(None);
    };

    if now - cached_at < ttl_secs(ttl) {
        return Ok(Some(serde_json::from_str(&payload)?));
    }

    // Only the row we judged stale; a concurrent refresh has a newer cached_at
    sqlx::query(&format!(
        "DELETE FROM {table} WHERE identifier = ? AND source = ? AND cached_at = ?"
    ))
    .bind(identifier)
    .bind(source.code())
    .bind(cached_at)
    .execute(pool)
    .await?;

    debug!(
        identifier,
        source = %source,
        medium = %medium,
        age_secs = now - cached_at,
        "Evicted stale payload"
    );
    Ok(None)
}

pub async fn get_payload(
    pool: &SqlitePool,
    identifier: &str,
    medium: Medium,
    source: Source,
    ttl: Duration,
) -> Result<Option<Value>> {
    get_payload_at(pool, identifier, medium, source, unix_now(), ttl).await
}

/// Upsert a payload stamped with `cached_at` (unix seconds)
pub async fn set_payload_at(
    pool: &SqlitePool,
    identifier: &str,
    medium: Medium,
    source: Source,
    payload: &Value,
    cached_at: i64,
) -> Result<()> {
    let table = medium.payload_table();
    let encoded = serde_json::to_string(payload)?;

    sqlx::query(&format!(
        r#"
        INSERT INTO {table} (identifier, source, payload, cached_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(identifier, source)
        DO UPDATE SET payload = excluded.payload, cached_at = excluded.cached_at
        "#
    ))
    .bind(identifier)
    .bind(source.code())
    .bind(encoded)
    .bind(cached_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn set_payload(
    pool: &SqlitePool,
    identifier: &str,
    medium: Medium,
    source: Source,
    payload: &Value,
) -> Result<()> {
    set_payload_at(pool, identifier, medium, source, payload, unix_now()).await
}

/// Delete every payload of a medium that a read at `now` would evict
pub async fn purge_expired(
    pool: &SqlitePool,
    medium: Medium,
    now: i64,
    ttl: Duration,
) -> Result<u64> {
    let table = medium.payload_table();
    let result = sqlx::query(&format!("DELETE FROM {table} WHERE cached_at <= ?"))
        .bind(now - ttl_secs(ttl))
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn count_payloads(pool: &SqlitePool, medium: Medium) -> Result<i64> {
    let table = medium.payload_table();
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub(crate) fn ttl_secs(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)
}
