//! Test helpers for resolver integration tests
//!
//! Provides:
//! - In-memory cache store
//! - MockAdapter: scripted catalog with call counters and failure injection
//! - MockFeed: scripted popular-titles feed

#![allow(dead_code)]

use async_trait::async_trait;
use mediadex_common::db::init_memory_database;
use mediadex_resolver::matcher::{best_match_any, MatchPolicy, NamedCandidate};
use mediadex_resolver::sources::{push_name, Resolved, SourceError};
use mediadex_resolver::{CacheStore, Document, Medium, PopularFeed, Source, SourceAdapter};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub async fn memory_cache() -> CacheStore {
    let pool = init_memory_database()
        .await
        .expect("in-memory database");
    CacheStore::new(pool)
}

/// Document shape every mock catalog returns
pub fn mock_document(id: &str, names: &[&str]) -> Document {
    json!({
        "id": id,
        "title": names.first(),
        "synonyms": names.get(1..).unwrap_or_default(),
    })
}

fn document_names(document: &Document) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(title) = document.get("title").and_then(Value::as_str) {
        push_name(&mut names, title);
    }
    if let Some(synonyms) = document.get("synonyms").and_then(Value::as_array) {
        for name in synonyms.iter().filter_map(Value::as_str) {
            push_name(&mut names, name);
        }
    }
    names
}

struct MockEntry {
    id: String,
    names: Vec<String>,
}

/// Scripted catalog adapter
pub struct MockAdapter {
    source: Source,
    entries: Vec<MockEntry>,
    tracks_alias: bool,
    delay: Option<Duration>,
    failing: AtomicBool,
    by_id_calls: AtomicUsize,
    by_query_calls: AtomicUsize,
    hints: Mutex<Vec<Option<String>>>,
    synonyms_seen: Mutex<Vec<Vec<String>>>,
}

impl MockAdapter {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            entries: Vec::new(),
            tracks_alias: false,
            delay: None,
            failing: AtomicBool::new(false),
            by_id_calls: AtomicUsize::new(0),
            by_query_calls: AtomicUsize::new(0),
            hints: Mutex::new(Vec::new()),
            synonyms_seen: Mutex::new(Vec::new()),
        }
    }

    /// Add a catalog entry; the first name is its title
    pub fn entry(mut self, id: &str, names: &[&str]) -> Self {
        self.entries.push(MockEntry {
            id: id.to_string(),
            names: names.iter().map(|n| n.to_string()).collect(),
        });
        self
    }

    pub fn tracking_title_alias(mut self) -> Self {
        self.tracks_alias = true;
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn by_id_calls(&self) -> usize {
        self.by_id_calls.load(Ordering::SeqCst)
    }

    pub fn by_query_calls(&self) -> usize {
        self.by_query_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.by_id_calls() + self.by_query_calls()
    }

    pub fn hints(&self) -> Vec<Option<String>> {
        self.hints.lock().unwrap().clone()
    }

    pub fn synonyms_seen(&self) -> Vec<Vec<String>> {
        self.synonyms_seen.lock().unwrap().clone()
    }

    fn document(&self, entry: &MockEntry) -> Document {
        let names: Vec<&str> = entry.names.iter().map(String::as_str).collect();
        mock_document(&entry.id, &names)
    }

    async fn simulate_latency(&self) -> Result<(), SourceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Network("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn source(&self) -> Source {
        self.source
    }

    fn policy(&self) -> MatchPolicy {
        MatchPolicy::LISTING
    }

    async fn fetch_by_id(
        &self,
        _medium: Medium,
        id: &str,
        title_hint: Option<&str>,
    ) -> Result<Option<Document>, SourceError> {
        self.by_id_calls.fetch_add(1, Ordering::SeqCst);
        self.hints.lock().unwrap().push(title_hint.map(String::from));
        self.simulate_latency().await?;

        Ok(self
            .entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| self.document(e)))
    }

    async fn fetch_by_query(
        &self,
        _medium: Medium,
        query: &str,
        synonyms: &[String],
    ) -> Result<Option<Resolved>, SourceError> {
        self.by_query_calls.fetch_add(1, Ordering::SeqCst);
        self.synonyms_seen.lock().unwrap().push(synonyms.to_vec());
        self.simulate_latency().await?;

        let candidates: Vec<NamedCandidate> = self
            .entries
            .iter()
            .map(|e| NamedCandidate::new(e.names.iter().cloned()))
            .collect();
        let queries = std::iter::once(query).chain(synonyms.iter().map(String::as_str));

        Ok(best_match_any(queries, &candidates, &self.policy()).map(|index| {
            let entry = &self.entries[index];
            Resolved {
                id: entry.id.clone(),
                document: self.document(entry),
            }
        }))
    }

    fn synonyms(&self, document: &Document) -> Vec<String> {
        document_names(document)
    }

    fn tracks_title_alias(&self) -> bool {
        self.tracks_alias
    }

    fn canonical_title(&self, document: &Document) -> Option<String> {
        document.get("title").and_then(Value::as_str).map(String::from)
    }
}

/// Scripted popular feed serving AniList-style pages
pub struct MockFeed {
    source: Source,
    media: Vec<Medium>,
    pages: HashMap<u32, Result<Vec<Document>, u16>>,
    requested: Mutex<Vec<u32>>,
}

impl MockFeed {
    pub fn new(source: Source, media: &[Medium]) -> Self {
        Self {
            source,
            media: media.to_vec(),
            pages: HashMap::new(),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn page(mut self, page: u32, entries: Vec<Document>) -> Self {
        self.pages.insert(page, Ok(entries));
        self
    }

    /// Page that fails with an HTTP status
    pub fn failing_page(mut self, page: u32, status: u16) -> Self {
        self.pages.insert(page, Err(status));
        self
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceAdapter for MockFeed {
    fn source(&self) -> Source {
        self.source
    }

    fn policy(&self) -> MatchPolicy {
        MatchPolicy::STRUCTURED
    }

    async fn fetch_by_id(
        &self,
        _medium: Medium,
        id: &str,
        _title_hint: Option<&str>,
    ) -> Result<Option<Document>, SourceError> {
        Ok(self
            .pages
            .values()
            .filter_map(|p| p.as_ref().ok())
            .flatten()
            .find(|d| d.get("id").and_then(Value::as_str) == Some(id))
            .cloned())
    }

    async fn fetch_by_query(
        &self,
        _medium: Medium,
        _query: &str,
        _synonyms: &[String],
    ) -> Result<Option<Resolved>, SourceError> {
        Ok(None)
    }

    fn synonyms(&self, document: &Document) -> Vec<String> {
        document_names(document)
    }
}

#[async_trait]
impl PopularFeed for MockFeed {
    fn feed_covers(&self, medium: Medium) -> bool {
        self.media.contains(&medium)
    }

    async fn popular_page(&self, _medium: Medium, page: u32) -> Result<Vec<Document>, SourceError> {
        self.requested.lock().unwrap().push(page);
        match self.pages.get(&page) {
            Some(Ok(entries)) => Ok(entries.clone()),
            Some(Err(status)) => Err(SourceError::Status(*status)),
            None => Ok(Vec::new()),
        }
    }

    fn entry_id(&self, entry: &Document) -> Option<String> {
        entry
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(String::from)
    }
}
