//! Name → source identifier mappings

use super::name_key;
use mediadex_common::{Error, Medium, Result, Source};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::warn;

/// Every known source id for a name, or `None` when no row matches
pub async fn get_identifiers(
    pool: &SqlitePool,
    name: &str,
    medium: Medium,
) -> Result<Option<HashMap<Source, String>>> {
    let rows: Vec<(i64, String)> = sqlx::query_as(
        "SELECT source, identifier FROM lookup WHERE name_key = ? AND medium = ?",
    )
    .bind(name_key(name))
    .bind(medium.code())
    .fetch_all(pool)
    .await?;

    let mut ids = HashMap::with_capacity(rows.len());
    for (code, identifier) in rows {
        if identifier.is_empty() {
            continue;
        }
        match Source::from_code(code) {
            Some(source) => {
                ids.insert(source, identifier);
            }
            None => warn!(code, lookup_name = name, "Ignoring lookup row with unknown source code"),
        }
    }

    Ok(if ids.is_empty() { None } else { Some(ids) })
}

/// Upsert one mapping; the last writer for a (name, medium, source) wins
pub async fn set_identifier(
    pool: &SqlitePool,
    name: &str,
    medium: Medium,
    source: Source,
    identifier: &str,
) -> Result<()> {
    let key = name_key(name);
    if key.is_empty() {
        return Err(Error::InvalidInput("identifier name is blank".to_string()));
    }
    if identifier.is_empty() {
        return Err(Error::InvalidInput(format!("blank {} identifier for '{}'", source, name)));
    }

    sqlx::query(
        r#"
        INSERT INTO lookup (name_key, name, medium, source, identifier)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(name_key, medium, source)
        DO UPDATE SET name = excluded.name, identifier = excluded.identifier
        "#,
    )
    .bind(key)
    .bind(name.trim())
    .bind(medium.code())
    .bind(source.code())
    .bind(identifier)
    .execute(pool)
    .await?;

    Ok(())
}

/// Number of mappings stored for a medium
pub async fn count_identifiers(pool: &SqlitePool, medium: Medium) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM lookup WHERE medium = ?")
        .bind(medium.code())
        .fetch_one(pool)
        .await?;
    Ok(count)
}
