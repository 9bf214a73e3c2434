//! Per-query resolution
//!
//! A query goes through four stages:
//!
//! 1. **Cache lookup**: the identifiers stored for the query text, and every
//!    payload still fresh for them, form a [`CacheSnapshot`].
//! 2. **Per-source resolution**: for each target source, a cached payload
//!    is used as is; a known id is fetched by id; otherwise the source is
//!    searched with the query text plus every synonym found so far. Each
//!    step is a fold over [`ResolveState`], see [`Resolver::resolve_source`].
//! 3. **Write-back**: fresh payloads, title aliases and no-match markers are
//!    stored, then every known name is linked to every resolved id.
//! 4. The merged map is returned; sources without a result are absent.
//!
//! Nothing a single source or the cache does can fail the query. Only a
//! blank query text is an error.

use crate::cache::CacheStore;
use crate::error::{ResolveError, ResolveResult};
use crate::primer::{PopularFeed, PrimeReport, Primer};
use crate::sources::{push_name, Document, QueryOutcome, SourceRegistry};
use futures::future::join_all;
use mediadex_common::config::{ResolveMode, SourcesConfig};
use mediadex_common::{Medium, Source};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default per-call adapter timeout
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(3);

/// Documents by source for one query
pub type ResolutionResult = BTreeMap<Source, Document>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    pub medium: Medium,
}

impl Query {
    pub fn new(text: impl Into<String>, medium: Medium) -> Self {
        Self {
            text: text.into(),
            medium,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub source_timeout: Duration,
    pub mode: ResolveMode,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
            mode: ResolveMode::Sequential,
        }
    }
}

impl ResolverConfig {
    pub fn from_sources_config(config: &SourcesConfig) -> Self {
        Self {
            source_timeout: config.request_timeout(),
            mode: config.resolve_mode,
        }
    }
}

/// What the cache knew about the query text before any source was asked
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    /// Fresh payloads
    pub known: HashMap<Source, Document>,
    /// Every stored id, with or without a fresh payload
    pub known_ids: HashMap<Source, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provenance {
    Cached,
    Fetched,
}

/// One source's contribution to a query
#[derive(Debug, Clone, PartialEq)]
pub struct SourceOutcome {
    pub source: Source,
    pub id: String,
    pub document: Document,
    pub provenance: Provenance,
    /// Name variants the document carries
    pub names: Vec<String>,
    /// Set only for sources tracking a title alias
    pub canonical_title: Option<String>,
}

/// Result of asking one source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceStep {
    Resolved(SourceOutcome),
    /// The source answered cleanly without a match when searched with
    /// these synonyms
    NoMatch(Source, Vec<String>),
    /// Skipped, failed or timed out
    Nothing,
}

impl SourceStep {
    pub fn outcome(&self) -> Option<&SourceOutcome> {
        match self {
            SourceStep::Resolved(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// Accumulator threaded through the per-source fold
#[derive(Debug, Clone, Default)]
pub struct ResolveState {
    synonyms: Vec<String>,
    outcomes: Vec<SourceOutcome>,
    misses: Vec<(Source, Vec<String>)>,
}

impl ResolveState {
    /// State starting with names already known to belong to the query
    pub fn seeded<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = Self::default();
        state.add_names(names);
        state
    }

    fn add_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            push_name(&mut self.synonyms, name.as_ref());
        }
    }

    pub fn synonyms(&self) -> &[String] {
        &self.synonyms
    }

    pub fn outcomes(&self) -> &[SourceOutcome] {
        &self.outcomes
    }

    /// Fold one step into the state
    pub fn absorb(mut self, step: SourceStep) -> Self {
        match step {
            SourceStep::Resolved(outcome) => {
                self.add_names(&outcome.names);
                self.outcomes.retain(|o| o.source != outcome.source);
                self.outcomes.push(outcome);
            }
            SourceStep::NoMatch(source, searched) => {
                self.misses.retain(|(s, _)| *s != source);
                self.misses.push((source, searched));
            }
            SourceStep::Nothing => {}
        }
        self
    }

    pub fn into_result(self) -> ResolutionResult {
        self.outcomes
            .into_iter()
            .map(|o| (o.source, o.document))
            .collect()
    }
}

pub struct Resolver {
    cache: CacheStore,
    registry: SourceRegistry,
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(cache: CacheStore, registry: SourceRegistry, config: ResolverConfig) -> Self {
        Self {
            cache,
            registry,
            config,
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve a query against the requested sources (all registered sources
    /// when `None`)
    pub async fn resolve(
        &self,
        query: &Query,
        sources: Option<&[Source]>,
    ) -> ResolveResult<ResolutionResult> {
        self.resolve_seeded(query, sources, &[]).await
    }

    /// [`Resolver::resolve`] with names already known to belong to the query
    pub async fn resolve_seeded(
        &self,
        query: &Query,
        sources: Option<&[Source]>,
        seed_names: &[String],
    ) -> ResolveResult<ResolutionResult> {
        if query.text.trim().is_empty() {
            return Err(ResolveError::InvalidQuery("query text is blank".to_string()));
        }

        let targets = self.targets(sources);
        let snapshot = self.lookup_cache(query).await;
        let mut state = ResolveState::seeded(seed_names);

        match self.config.mode {
            ResolveMode::Sequential => {
                for source in targets {
                    let (next, _) = self.resolve_source(state, &snapshot, query, source).await;
                    state = next;
                }
            }
            ResolveMode::Concurrent => {
                // Only names known before the pass can be shared
                for (source, document) in &snapshot.known {
                    if let Some(adapter) = self.registry.get(*source) {
                        state.add_names(adapter.synonyms(document));
                    }
                }
                let synonyms = state.synonyms().to_vec();
                let steps = join_all(
                    targets
                        .iter()
                        .map(|&source| self.step(&snapshot, query, source, &synonyms)),
                )
                .await;
                for step in steps {
                    state = state.absorb(step);
                }
            }
        }

        self.write_back(query, &state).await;

        let fetched = state
            .outcomes()
            .iter()
            .filter(|o| o.provenance == Provenance::Fetched)
            .count();
        info!(
            query = %query.text,
            medium = %query.medium,
            resolved = state.outcomes().len(),
            fetched,
            "Resolved query"
        );

        Ok(state.into_result())
    }

    /// Requested sources in caller order without duplicates, or every
    /// registered source
    fn targets(&self, sources: Option<&[Source]>) -> Vec<Source> {
        match sources {
            Some(requested) => {
                let mut targets = Vec::with_capacity(requested.len());
                for source in requested {
                    if !targets.contains(source) {
                        targets.push(*source);
                    }
                }
                targets
            }
            None => self.registry.sources(),
        }
    }

    /// Identifiers stored for the query text and their fresh payloads
    pub async fn lookup_cache(&self, query: &Query) -> CacheSnapshot {
        let Some(known_ids) = self.cache.get_identifiers(&query.text, query.medium).await else {
            debug!(query = %query.text, medium = %query.medium, "No cached identifiers");
            return CacheSnapshot::default();
        };

        let mut known = HashMap::new();
        for (source, id) in &known_ids {
            if let Some(document) = self.cache.get_payload(id, query.medium, *source).await {
                known.insert(*source, document);
            }
        }

        CacheSnapshot { known, known_ids }
    }

    /// One fold step: ask `source` with the synonyms accumulated in `state`
    pub async fn resolve_source(
        &self,
        state: ResolveState,
        snapshot: &CacheSnapshot,
        query: &Query,
        source: Source,
    ) -> (ResolveState, Option<SourceOutcome>) {
        let step = self.step(snapshot, query, source, state.synonyms()).await;
        let outcome = step.outcome().cloned();
        (state.absorb(step), outcome)
    }

    async fn step(
        &self,
        snapshot: &CacheSnapshot,
        query: &Query,
        source: Source,
        synonyms: &[String],
    ) -> SourceStep {
        let medium = query.medium;

        if !source.covers(medium) {
            debug!(source = %source, medium = %medium, "Source does not list this medium");
            return SourceStep::Nothing;
        }
        let Some(adapter) = self.registry.get(source) else {
            debug!(source = %source, "Source not registered");
            return SourceStep::Nothing;
        };

        let outcome = |id: String, document: Document, provenance: Provenance| {
            let canonical_title = if adapter.tracks_title_alias() {
                adapter.canonical_title(&document)
            } else {
                None
            };
            SourceStep::Resolved(SourceOutcome {
                source,
                names: adapter.synonyms(&document),
                canonical_title,
                id,
                document,
                provenance,
            })
        };

        if let (Some(document), Some(id)) = (snapshot.known.get(&source), snapshot.known_ids.get(&source)) {
            debug!(source = %source, id = %id, "Using cached payload");
            return outcome(id.clone(), document.clone(), Provenance::Cached);
        }

        let timeout = self.config.source_timeout;

        if let Some(id) = snapshot.known_ids.get(&source) {
            let hint = if adapter.tracks_title_alias() {
                self.cache.get_title_alias(id, medium).await
            } else {
                None
            };
            return match tokio::time::timeout(timeout, adapter.resolve_by_id(medium, id, hint.as_deref())).await {
                Ok(Some(document)) => outcome(id.clone(), document, Provenance::Fetched),
                Ok(None) => SourceStep::Nothing,
                Err(_) => {
                    warn!(source = %source, id = %id, timeout_ms = timeout.as_millis() as u64, "Lookup by id timed out");
                    SourceStep::Nothing
                }
            };
        }

        if self.cache.is_recent_miss(&query.text, medium, source, synonyms).await {
            debug!(source = %source, query = %query.text, "Recent no-match, skipping search");
            return SourceStep::Nothing;
        }

        match tokio::time::timeout(timeout, adapter.lookup_by_query(medium, &query.text, synonyms)).await {
            Ok(QueryOutcome::Found(resolved)) => {
                outcome(resolved.id, resolved.document, Provenance::Fetched)
            }
            Ok(QueryOutcome::NoMatch) => SourceStep::NoMatch(source, synonyms.to_vec()),
            Ok(QueryOutcome::Failed) => SourceStep::Nothing,
            Err(_) => {
                warn!(source = %source, query = %query.text, timeout_ms = timeout.as_millis() as u64, "Search timed out");
                SourceStep::Nothing
            }
        }
    }

    /// Store what this pass learned. Failures are logged by the cache store.
    async fn write_back(&self, query: &Query, state: &ResolveState) {
        let medium = query.medium;

        for outcome in state.outcomes() {
            if outcome.provenance != Provenance::Fetched {
                continue;
            }
            self.cache
                .set_payload(&outcome.id, medium, outcome.source, &outcome.document)
                .await;
            if let Some(title) = &outcome.canonical_title {
                self.cache.set_title_alias(&outcome.id, medium, title).await;
            }
        }

        for (source, searched) in &state.misses {
            self.cache.record_miss(&query.text, medium, *source, searched).await;
        }

        if state.outcomes().is_empty() {
            return;
        }

        let mut names = Vec::with_capacity(state.synonyms().len() + 1);
        push_name(&mut names, &query.text);
        for name in state.synonyms() {
            push_name(&mut names, name);
        }

        for name in &names {
            for outcome in state.outcomes() {
                self.cache
                    .set_identifier(name, medium, outcome.source, &outcome.id)
                    .await;
            }
        }
    }

    /// Pre-seed the cache from a popular feed, cross-resolving the first
    /// `cross_resolve_count` entries against `secondary`
    pub async fn prime(
        &self,
        feed: &dyn PopularFeed,
        secondary: Option<Source>,
        medium: Medium,
        page_count: u32,
        cross_resolve_count: usize,
    ) -> ResolveResult<PrimeReport> {
        Primer::new(self, feed, secondary)
            .run(medium, page_count, cross_resolve_count)
            .await
    }
}
