//! Catalog source adapters
//!
//! Each catalog implements [`SourceAdapter`]: fetch a document by a known id,
//! or search by text and pick the matching entry with the fuzzy matcher.
//! Adapters never touch the cache. Every failure stays inside the adapter:
//! callers go through the provided `resolve_by_*` wrappers, which log the
//! error and report "no result".

use crate::matcher::MatchPolicy;
use async_trait::async_trait;
use mediadex_common::config::SourcesConfig;
use mediadex_common::{Medium, Source};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub mod anidb;
pub mod anilist;
pub mod anime_planet;
pub mod http;
pub mod kitsu;
pub mod listing;
pub mod lndb;
pub mod mal;
pub mod manga_updates;
pub mod novel_updates;
pub mod vndb;

use crate::primer::PopularFeed;

/// Structured document returned by a catalog
pub type Document = serde_json::Value;

/// A search result: the matched document and its catalog id
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub id: String,
    pub document: Document,
}

/// Failure talking to a catalog
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("{0} is not listed by this source")]
    Unsupported(Medium),

    #[error("Query is shorter than the {0} characters this source searches with")]
    QueryTooShort(usize),
}

/// Result of a text search with failures kept apart from clean misses
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Found(Resolved),
    NoMatch,
    Failed,
}

impl QueryOutcome {
    pub fn into_resolved(self) -> Option<Resolved> {
        match self {
            QueryOutcome::Found(resolved) => Some(resolved),
            QueryOutcome::NoMatch | QueryOutcome::Failed => None,
        }
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> Source;

    /// Acceptance settings for this catalog's search results
    fn policy(&self) -> MatchPolicy;

    /// Fetch the canonical document for a known id. No fuzzy matching: the id
    /// is authoritative. `title_hint` is the cached canonical title for
    /// sources that track one.
    async fn fetch_by_id(
        &self,
        medium: Medium,
        id: &str,
        title_hint: Option<&str>,
    ) -> Result<Option<Document>, SourceError>;

    /// Search by text, matching against `query` first and then each synonym
    async fn fetch_by_query(
        &self,
        medium: Medium,
        query: &str,
        synonyms: &[String],
    ) -> Result<Option<Resolved>, SourceError>;

    /// Every name variant a document carries
    fn synonyms(&self, document: &Document) -> Vec<String>;

    /// Whether the resolver should keep this source's canonical titles
    fn tracks_title_alias(&self) -> bool {
        false
    }

    fn canonical_title(&self, _document: &Document) -> Option<String> {
        None
    }

    async fn resolve_by_id(
        &self,
        medium: Medium,
        id: &str,
        title_hint: Option<&str>,
    ) -> Option<Document> {
        match self.fetch_by_id(medium, id, title_hint).await {
            Ok(document) => document,
            Err(e) => {
                warn!(source = %self.source(), medium = %medium, id, error = %e, "Lookup by id failed");
                None
            }
        }
    }

    async fn lookup_by_query(
        &self,
        medium: Medium,
        query: &str,
        synonyms: &[String],
    ) -> QueryOutcome {
        match self.fetch_by_query(medium, query, synonyms).await {
            Ok(Some(resolved)) => QueryOutcome::Found(resolved),
            Ok(None) => QueryOutcome::NoMatch,
            Err(e) => {
                warn!(source = %self.source(), medium = %medium, query, error = %e, "Search failed");
                QueryOutcome::Failed
            }
        }
    }

    async fn resolve_by_query(
        &self,
        medium: Medium,
        query: &str,
        synonyms: &[String],
    ) -> Option<Resolved> {
        self.lookup_by_query(medium, query, synonyms)
            .await
            .into_resolved()
    }
}

/// Adapters keyed by the catalog they serve
#[derive(Clone, Default)]
pub struct SourceRegistry {
    adapters: HashMap<Source, Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an adapter, replacing any previous one for the same source
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.insert(adapter.source(), adapter)
    }

    pub fn with(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, source: Source) -> Option<&Arc<dyn SourceAdapter>> {
        self.adapters.get(&source)
    }

    pub fn contains(&self, source: Source) -> bool {
        self.adapters.contains_key(&source)
    }

    /// Registered sources in default resolution order
    pub fn sources(&self) -> Vec<Source> {
        Source::ALL
            .into_iter()
            .filter(|s| self.adapters.contains_key(s))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.sources())
            .finish()
    }
}

/// Adapters built from configuration
pub struct ConfiguredSources {
    pub registry: SourceRegistry,
    /// Popular-titles feed for the primer, when its source is enabled
    pub popular_feed: Option<Arc<dyn PopularFeed>>,
}

/// Build every enabled adapter.
///
/// Sources without their credentials are skipped with a warning unless they
/// were listed explicitly, which config validation already rejects.
pub fn configure_sources(config: &SourcesConfig) -> mediadex_common::Result<ConfiguredSources> {
    let settings = http::HttpSettings::from_config(config);
    let client = |source: Source, per_second: u32| {
        http::HttpClient::new(source, &settings.clone().with_rate(per_second)).map_err(|e| {
            mediadex_common::Error::Config(format!("Failed to build HTTP client for {}: {}", source, e))
        })
    };

    let mut registry = SourceRegistry::new();
    let mut popular_feed: Option<Arc<dyn PopularFeed>> = None;

    for source in Source::ALL {
        if !config.is_enabled(source) {
            continue;
        }
        if let Some(key) = config.missing_requirement(source) {
            warn!(source = %source, "Skipping source: {} is not set", key);
            continue;
        }

        let adapter: Arc<dyn SourceAdapter> = match source {
            Source::AniList => {
                let anilist = Arc::new(anilist::AniListAdapter::new(client(source, 1)?));
                popular_feed = Some(anilist.clone());
                anilist
            }
            Source::MyAnimeList => {
                let client_id = config.mal_client_id.clone().unwrap_or_default();
                Arc::new(mal::MalAdapter::new(client(source, 2)?, client_id))
            }
            Source::Kitsu => Arc::new(kitsu::KitsuAdapter::new(client(source, 2)?)),
            Source::Vndb => Arc::new(vndb::VndbAdapter::new(client(source, 2)?)),
            Source::AniDb => {
                let path = config.anidb_titles_path.clone().unwrap_or_default();
                let titles = anidb::AniDbTitles::load(&path)?;
                Arc::new(anidb::AniDbAdapter::new(Arc::new(titles)))
            }
            Source::AnimePlanet => Arc::new(listing::ListingAdapter::new(
                anime_planet::AnimePlanet,
                client(source, 1)?,
            )),
            Source::MangaUpdates => Arc::new(listing::ListingAdapter::new(
                manga_updates::MangaUpdates,
                client(source, 1)?,
            )),
            Source::Lndb => Arc::new(listing::ListingAdapter::new(lndb::Lndb, client(source, 1)?)),
            Source::NovelUpdates => Arc::new(listing::ListingAdapter::new(
                novel_updates::NovelUpdates,
                client(source, 1)?,
            )),
        };

        registry.register(adapter);
    }

    info!(sources = ?registry.sources(), "Registered catalog sources");
    Ok(ConfiguredSources {
        registry,
        popular_feed,
    })
}

/// Push a name onto a list unless an equal name (ignoring case) is present
pub fn push_name(names: &mut Vec<String>, name: &str) {
    let name = name.trim();
    if name.is_empty() {
        return;
    }
    let key = name.to_lowercase();
    if !names.iter().any(|n| n.to_lowercase() == key) {
        names.push(name.to_string());
    }
}

/// String field of a JSON document, ignoring blanks
pub(crate) fn str_field<'a>(document: &'a Document, pointer: &str) -> Option<&'a str> {
    document
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Catalog id as a string, whether stored as a JSON number or string
pub(crate) fn id_field(document: &Document, pointer: &str) -> Option<String> {
    match document.pointer(pointer)? {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}
