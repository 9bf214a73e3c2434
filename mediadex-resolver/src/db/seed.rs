//! Synonym dump import
//!
//! Seeds the lookup and title alias tables from a community synonym
//! database: a SQLite file with a `synonyms(name, type, dblinks)` table
//! where `type` is `Anime`, `Manga` or `LN` and `dblinks` is JSON such as
//! `{"mal": ["Nisekoi", 18897], "ani": 18897, "ap": "nisekoi", "adb": 10376}`.

use super::{identifiers, title_aliases};
use mediadex_common::{Error, Medium, Result, Source};
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{info, warn};

/// One parsed dump row
#[derive(Debug, Clone, PartialEq)]
pub struct SynonymRow {
    pub name: String,
    pub medium: Medium,
    /// Source ids linked to the name
    pub links: Vec<(Source, String)>,
    /// MyAnimeList's own title for the linked entry
    pub mal_title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub identifiers_written: usize,
    pub title_aliases_written: usize,
}

/// Parse one `(name, type, dblinks)` row
pub fn parse_synonym_row(name: &str, kind: &str, dblinks: &str) -> Result<SynonymRow> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("synonym row has a blank name".to_string()));
    }

    let medium = match kind.trim().to_ascii_lowercase().as_str() {
        "anime" => Medium::Anime,
        "manga" => Medium::Manga,
        "ln" | "light novel" => Medium::LightNovel,
        other => other.parse()?,
    };

    let links: Value = serde_json::from_str(dblinks)?;
    let Value::Object(links) = links else {
        return Err(Error::InvalidInput(format!("dblinks for '{}' is not an object", name)));
    };

    let mut row = SynonymRow {
        name: name.to_string(),
        medium,
        links: Vec::new(),
        mal_title: None,
    };

    for (key, value) in &links {
        let source = match key.as_str() {
            "mal" => Source::MyAnimeList,
            "ani" => Source::AniList,
            "ap" => Source::AnimePlanet,
            "adb" => Source::AniDb,
            _ => continue,
        };

        // MyAnimeList links carry [title, id]
        let id = match (source, value) {
            (Source::MyAnimeList, Value::Array(pair)) if pair.len() == 2 => {
                row.mal_title = pair[0].as_str().map(str::to_string);
                id_string(&pair[1])
            }
            (_, value) => id_string(value),
        };

        if let Some(id) = id {
            row.links.push((source, id));
        }
    }

    Ok(row)
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Read every usable row of a dump file; unusable rows are logged and counted
pub async fn read_synonym_dump(dump_path: &Path) -> Result<(Vec<SynonymRow>, usize)> {
    if !dump_path.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("synonym dump not found: {}", dump_path.display()),
        )));
    }

    let url = format!("sqlite://{}?mode=ro", dump_path.display());
    let dump = SqlitePoolOptions::new().max_connections(1).connect(&url).await?;

    let raw: Vec<(Option<String>, Option<String>, Option<String>)> =
        sqlx::query_as("SELECT name, type, dblinks FROM synonyms")
            .fetch_all(&dump)
            .await?;
    dump.close().await;

    let mut rows = Vec::with_capacity(raw.len());
    let mut skipped = 0;
    for (name, kind, dblinks) in raw {
        let parsed = parse_synonym_row(
            name.as_deref().unwrap_or_default(),
            kind.as_deref().unwrap_or_default(),
            dblinks.as_deref().unwrap_or("{}"),
        );
        match parsed {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                warn!(name = ?name, error = %e, "Skipping synonym dump row");
            }
        }
    }

    Ok((rows, skipped))
}

/// Write parsed rows into the cache tables
pub async fn import_synonym_rows(pool: &SqlitePool, rows: &[SynonymRow]) -> SeedReport {
    let mut report = SeedReport {
        rows_read: rows.len(),
        ..SeedReport::default()
    };

    for row in rows {
        let mut failed = false;

        for (source, id) in &row.links {
            match identifiers::set_identifier(pool, &row.name, row.medium, *source, id).await {
                Ok(()) => report.identifiers_written += 1,
                Err(e) => {
                    failed = true;
                    warn!(name = %row.name, source = %source, error = %e, "Failed to seed identifier");
                }
            }
        }

        let mal = row.links.iter().find(|(s, _)| *s == Source::MyAnimeList);
        if let (Some((_, id)), Some(title)) = (mal, &row.mal_title) {
            match title_aliases::set_title_alias(pool, id, row.medium, title).await {
                Ok(()) => report.title_aliases_written += 1,
                Err(e) => {
                    failed = true;
                    warn!(name = %row.name, error = %e, "Failed to seed title alias");
                }
            }
        }

        if failed {
            report.rows_skipped += 1;
        }
    }

    report
}

/// Import a whole dump file
pub async fn seed_from_synonym_dump(pool: &SqlitePool, dump_path: &Path) -> Result<SeedReport> {
    let (rows, unreadable) = read_synonym_dump(dump_path).await?;
    let mut report = import_synonym_rows(pool, &rows).await;
    report.rows_read += unreadable;
    report.rows_skipped += unreadable;

    info!(
        rows = report.rows_read,
        skipped = report.rows_skipped,
        identifiers = report.identifiers_written,
        "Seeded lookup table from {}",
        dump_path.display()
    );
    Ok(report)
}
