//! Canonical titles for the source whose search needs exact phrasing

use mediadex_common::{Medium, Result};
use sqlx::SqlitePool;

pub async fn get_title_alias(
    pool: &SqlitePool,
    identifier: &str,
    medium: Medium,
) -> Result<Option<String>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT title FROM title_alias WHERE identifier = ? AND medium = ?")
            .bind(identifier)
            .bind(medium.code())
            .fetch_optional(pool)
            .await?;

    Ok(row.map(|(title,)| title))
}

pub async fn set_title_alias(
    pool: &SqlitePool,
    identifier: &str,
    medium: Medium,
    title: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO title_alias (identifier, medium, title)
        VALUES (?, ?, ?)
        ON CONFLICT(identifier, medium) DO UPDATE SET title = excluded.title
        "#,
    )
    .bind(identifier)
    .bind(medium.code())
    .bind(title)
    .execute(pool)
    .await?;

    Ok(())
}
