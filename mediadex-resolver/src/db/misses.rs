//! Recent "no match" answers
//!
//! A clean no-match from a source is remembered for the payload TTL together
//! with the names the search ran with. A repeated query skips that source
//! only while it brings no name the failed search lacked. Failures and
//! timeouts are never recorded here.

use super::name_key;
use super::payloads::ttl_secs;
use mediadex_common::{Medium, Result, Source};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::time::Duration;

/// Distinct name keys, sorted, as stored in `searched_names`
fn searched_keys(synonyms: &[String]) -> BTreeSet<String> {
    synonyms
        .iter()
        .map(|s| name_key(s))
        .filter(|k| !k.is_empty())
        .collect()
}

/// Whether the source answered "no match" for this name within `ttl` of `now`
/// while searching with at least the names in `synonyms`.
/// An expired row is deleted.
pub async fn is_recent_miss_at(
    pool: &SqlitePool,
    name: &str,
    medium: Medium,
    source: Source,
    synonyms: &[String],
    now: i64,
    ttl: Duration,
) -> Result<bool> {
    let key = name_key(name);
    let row: Option<(i64, String)> = sqlx::query_as(
        "SELECT cached_at, searched_names FROM lookup_miss WHERE name_key = ? AND medium = ? AND source = ?",
    )
    .bind(&key)
    .bind(medium.code())
    .bind(source.code())
    .fetch_optional(pool)
    .await?;

    let Some((cached_at, searched_names)) = row else {
        return Ok(false);
    };

    if now - cached_at < ttl_secs(ttl) {
        let searched: BTreeSet<String> = serde_json::from_str(&searched_names)?;
        let covered = searched_keys(synonyms)
            .iter()
            .all(|k| *k == key || searched.contains(k));
        return Ok(covered);
    }

    sqlx::query(
        "DELETE FROM lookup_miss WHERE name_key = ? AND medium = ? AND source = ? AND cached_at = ?",
    )
    .bind(&key)
    .bind(medium.code())
    .bind(source.code())
    .bind(cached_at)
    .execute(pool)
    .await?;

    Ok(false)
}

/// Remember a no-match; a later miss for the same key replaces the names
pub async fn record_miss_at(
    pool: &SqlitePool,
    name: &str,
    medium: Medium,
    source: Source,
    synonyms: &[String],
    cached_at: i64,
) -> Result<()> {
    let searched_names = serde_json::to_string(&searched_keys(synonyms))?;

    sqlx::query(
        r#"
        INSERT INTO lookup_miss (name_key, medium, source, searched_names, cached_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(name_key, medium, source)
        DO UPDATE SET searched_names = excluded.searched_names, cached_at = excluded.cached_at
        "#,
    )
    .bind(name_key(name))
    .bind(medium.code())
    .bind(source.code())
    .bind(searched_names)
    .bind(cached_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn purge_expired(pool: &SqlitePool, now: i64, ttl: Duration) -> Result<u64> {
    let result = sqlx::query("DELETE FROM lookup_miss WHERE cached_at <= ?")
        .bind(now - ttl_secs(ttl))
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
