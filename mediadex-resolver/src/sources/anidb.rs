//! AniDB adapter backed by the offline title dump
//!
//! AniDB publishes every title as `aid|type|language|title` lines. The dump
//! is loaded once at startup into an immutable [`AniDbTitles`] snapshot that
//! the adapter shares by `Arc`; no request ever reaches AniDB itself.

use super::{push_name, Document, Resolved, SourceAdapter, SourceError};
use crate::matcher::{normalize, score, select, Candidate, MatchPolicy};
use async_trait::async_trait;
use mediadex_common::{Medium, Source};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

const ANIME_URL: &str = "https://anidb.net/anime";
/// Title type of the main title in the dump
const PRIMARY_TITLE_TYPE: &str = "1";
/// Entries scored between cancellation checks
const SCAN_CHUNK: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub struct AniDbEntry {
    pub aid: String,
    /// Main title first, then every other title in dump order
    pub titles: Vec<String>,
}

impl Candidate for AniDbEntry {
    fn names(&self) -> Vec<&str> {
        self.titles.iter().map(String::as_str).collect()
    }
}

impl AniDbEntry {
    fn document(&self) -> Document {
        json!({
            "id": self.aid,
            "title": self.titles.first(),
            "titles": self.titles,
            "url": format!("{}/{}", ANIME_URL, self.aid),
        })
    }
}

/// Snapshot of the title dump
#[derive(Debug, Default)]
pub struct AniDbTitles {
    entries: Vec<AniDbEntry>,
    by_aid: HashMap<String, usize>,
    by_title: HashMap<String, usize>,
}

impl AniDbTitles {
    pub fn parse(content: &str) -> Self {
        let mut titles = AniDbTitles::default();
        let mut malformed = 0usize;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.splitn(4, '|');
            let (Some(aid), Some(kind), Some(_lang), Some(title)) =
                (fields.next(), fields.next(), fields.next(), fields.next())
            else {
                malformed += 1;
                continue;
            };
            let (aid, title) = (aid.trim(), title.trim());
            if aid.is_empty() || title.is_empty() {
                malformed += 1;
                continue;
            }

            let index = match titles.by_aid.get(aid) {
                Some(&index) => index,
                None => {
                    titles.entries.push(AniDbEntry {
                        aid: aid.to_string(),
                        titles: Vec::new(),
                    });
                    let index = titles.entries.len() - 1;
                    titles.by_aid.insert(aid.to_string(), index);
                    index
                }
            };

            let entry = &mut titles.entries[index];
            if kind.trim() == PRIMARY_TITLE_TYPE {
                entry.titles.retain(|t| t != title);
                entry.titles.insert(0, title.to_string());
            } else if !entry.titles.iter().any(|t| t == title) {
                entry.titles.push(title.to_string());
            }

            titles.by_title.entry(normalize(title)).or_insert(index);
        }

        if malformed > 0 {
            warn!(malformed, "Skipped malformed AniDB title lines");
        }
        titles
    }

    pub fn load(path: &Path) -> mediadex_common::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let titles = Self::parse(&content);
        info!(entries = titles.len(), "Loaded AniDB titles from {}", path.display());
        Ok(titles)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, aid: &str) -> Option<&AniDbEntry> {
        self.by_aid.get(aid).map(|&i| &self.entries[i])
    }

    /// Entry carrying exactly this title (ignoring case)
    pub fn exact(&self, title: &str) -> Option<&AniDbEntry> {
        self.by_title.get(&normalize(title)).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[AniDbEntry] {
        &self.entries
    }
}

/// Sets the flag when dropped, which happens when a timed-out search
/// future is abandoned
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Fuzzy match over the whole dump, trying each query in order.
/// Returns `None` as soon as `cancelled` is set.
fn scan(
    titles: &AniDbTitles,
    queries: &[String],
    policy: &MatchPolicy,
    cancelled: &AtomicBool,
) -> Option<usize> {
    let mut tried: Vec<String> = Vec::new();
    for query in queries {
        let normalized = normalize(query);
        if normalized.is_empty() || tried.contains(&normalized) {
            continue;
        }

        let mut scores = Vec::with_capacity(titles.len());
        for chunk in titles.entries().chunks(SCAN_CHUNK) {
            if cancelled.load(Ordering::Relaxed) {
                return None;
            }
            scores.extend(chunk.iter().map(|e| (score(&normalized, e), e.is_abbreviated())));
        }

        if let Some(index) = select(&scores, policy) {
            return Some(index);
        }
        tried.push(normalized);
    }
    None
}

pub struct AniDbAdapter {
    titles: Arc<AniDbTitles>,
}

impl AniDbAdapter {
    pub fn new(titles: Arc<AniDbTitles>) -> Self {
        Self { titles }
    }
}

fn ensure_anime(medium: Medium) -> Result<(), SourceError> {
    if medium == Medium::Anime {
        Ok(())
    } else {
        Err(SourceError::Unsupported(medium))
    }
}

#[async_trait]
impl SourceAdapter for AniDbAdapter {
    fn source(&self) -> Source {
        Source::AniDb
    }

    fn policy(&self) -> MatchPolicy {
        MatchPolicy::LISTING
    }

    async fn fetch_by_id(
        &self,
        medium: Medium,
        id: &str,
        _title_hint: Option<&str>,
    ) -> Result<Option<Document>, SourceError> {
        ensure_anime(medium)?;
        Ok(Some(match self.titles.get(id) {
            Some(entry) => entry.document(),
            None => json!({ "id": id, "url": format!("{}/{}", ANIME_URL, id) }),
        }))
    }

    async fn fetch_by_query(
        &self,
        medium: Medium,
        query: &str,
        synonyms: &[String],
    ) -> Result<Option<Resolved>, SourceError> {
        ensure_anime(medium)?;

        let queries: Vec<String> = std::iter::once(query.to_string())
            .chain(synonyms.iter().cloned())
            .collect();

        if let Some(entry) = queries.iter().find_map(|q| self.titles.exact(q)) {
            return Ok(Some(Resolved {
                id: entry.aid.clone(),
                document: entry.document(),
            }));
        }

        // Scoring the whole dump is CPU-bound. The scan stops if this future
        // is dropped by the caller's timeout.
        let titles = Arc::clone(&self.titles);
        let policy = self.policy();
        let cancelled = Arc::new(AtomicBool::new(false));
        let _cancel = CancelOnDrop(Arc::clone(&cancelled));
        let found = tokio::task::spawn_blocking(move || {
            let index = scan(&titles, &queries, &policy, &cancelled)?;
            let entry = &titles.entries()[index];
            Some(Resolved {
                id: entry.aid.clone(),
                document: entry.document(),
            })
        })
        .await
        .map_err(|e| SourceError::Parse(format!("title matching task failed: {}", e)))?;

        Ok(found)
    }

    fn synonyms(&self, document: &Document) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(titles) = document.get("titles").and_then(Value::as_array) {
            for title in titles.iter().filter_map(Value::as_str) {
                push_name(&mut names, title);
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = "\
# created: Sat Oct 1 00:00:00 2026
# <aid>|<type>|<language>|<title>
10376|4|en|Nisekoi: False Love
10376|1|x-jat|Nisekoi
10376|4|ja|ニセコイ
9541|1|x-jat|Shingeki no Kyojin
9541|4|en|Attack on Titan
9541|3|en|SnK
broken line
";

    fn adapter() -> AniDbAdapter {
        AniDbAdapter::new(Arc::new(AniDbTitles::parse(DUMP)))
    }

    #[test]
    fn test_parse_groups_titles_with_primary_first() {
        let titles = AniDbTitles::parse(DUMP);
        assert_eq!(titles.len(), 2);
        let entry = titles.get("10376").unwrap();
        assert_eq!(entry.titles, vec!["Nisekoi", "Nisekoi: False Love", "ニセコイ"]);
        assert_eq!(titles.exact("attack on titan").unwrap().aid, "9541");
    }

    #[tokio::test]
    async fn test_exact_title_lookup() {
        let resolved = adapter()
            .fetch_by_query(Medium::Anime, "NISEKOI", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, "10376");
        assert_eq!(resolved.document["url"], "https://anidb.net/anime/10376");
    }

    #[tokio::test]
    async fn test_fuzzy_lookup_and_no_match() {
        let adapter = adapter();
        let resolved = adapter
            .fetch_by_query(Medium::Anime, "Shingeki no Kyojin!", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, "9541");

        let none = adapter
            .fetch_by_query(Medium::Anime, "Toradora", &[])
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_by_id_builds_url_without_lookup() {
        let adapter = adapter();
        let known = adapter.fetch_by_id(Medium::Anime, "9541", None).await.unwrap().unwrap();
        assert_eq!(known["title"], "Shingeki no Kyojin");

        let unknown = adapter.fetch_by_id(Medium::Anime, "1", None).await.unwrap().unwrap();
        assert_eq!(unknown["url"], "https://anidb.net/anime/1");
    }

    #[tokio::test]
    async fn test_other_media_are_rejected() {
        let result = adapter().fetch_by_query(Medium::Manga, "Nisekoi", &[]).await;
        assert!(matches!(result, Err(SourceError::Unsupported(Medium::Manga))));
    }

    #[test]
    fn test_scan_gives_up_once_cancelled() {
        let titles = AniDbTitles::parse(DUMP);
        let queries = vec!["Shingeki no Kyojin!".to_string()];
        let policy = MatchPolicy::LISTING;

        let running = AtomicBool::new(false);
        assert_eq!(scan(&titles, &queries, &policy, &running), Some(1));

        let cancelled = AtomicBool::new(true);
        assert_eq!(scan(&titles, &queries, &policy, &cancelled), None);
    }

    #[tokio::test]
    async fn test_abandoned_search_cancels_the_scan() {
        let flag = Arc::new(AtomicBool::new(false));
        let guard = CancelOnDrop(Arc::clone(&flag));
        let search = async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        };

        let result = tokio::time::timeout(std::time::Duration::from_millis(10), search).await;

        assert!(result.is_err());
        assert!(flag.load(Ordering::Relaxed));
    }

    #[test]
    fn test_document_synonyms() {
        let adapter = adapter();
        let document = AniDbTitles::parse(DUMP).get("9541").unwrap().document();
        assert_eq!(
            adapter.synonyms(&document),
            vec!["Shingeki no Kyojin", "Attack on Titan", "SnK"]
        );
    }
}
