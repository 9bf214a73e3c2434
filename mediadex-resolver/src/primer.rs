//! Bulk cache priming from a popular-titles feed
//!
//! Walks the feed page by page, stores every entry's payload and links each
//! of its names to its id, so later queries for popular titles are answered
//! from the cache. The first few entries are also cross-resolved against a
//! secondary source.

use crate::error::{ResolveError, ResolveResult};
use crate::orchestrator::{Query, Resolver};
use crate::sources::{Document, SourceAdapter, SourceError};
use async_trait::async_trait;
use mediadex_common::{Medium, Source};
use serde::Serialize;
use tracing::{debug, info, warn};

/// A source that can list its most popular titles
#[async_trait]
pub trait PopularFeed: SourceAdapter {
    fn feed_covers(&self, medium: Medium) -> bool;

    /// One page of entries, most popular first. Pages start at 1; an empty
    /// page means the feed is exhausted.
    async fn popular_page(&self, medium: Medium, page: u32) -> Result<Vec<Document>, SourceError>;

    fn entry_id(&self, entry: &Document) -> Option<String>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrimeReport {
    pub pages_fetched: u32,
    pub pages_failed: u32,
    pub entries_cached: usize,
    /// Entries without an id
    pub entries_skipped: usize,
    pub cross_resolved: usize,
    pub cross_missed: usize,
}

pub(crate) struct Primer<'a> {
    resolver: &'a Resolver,
    feed: &'a dyn PopularFeed,
    secondary: Option<Source>,
}

impl<'a> Primer<'a> {
    pub(crate) fn new(resolver: &'a Resolver, feed: &'a dyn PopularFeed, secondary: Option<Source>) -> Self {
        // Cross-resolving the feed against itself links nothing new
        let secondary = secondary.filter(|s| *s != feed.source());
        Self {
            resolver,
            feed,
            secondary,
        }
    }

    pub(crate) async fn run(
        &self,
        medium: Medium,
        page_count: u32,
        cross_resolve_count: usize,
    ) -> ResolveResult<PrimeReport> {
        let feed_source = self.feed.source();
        if !self.feed.feed_covers(medium) {
            return Err(ResolveError::UnsupportedMedium {
                feed: feed_source,
                medium,
            });
        }

        let mut report = PrimeReport::default();
        let mut cross_budget = if self.secondary.is_some() {
            cross_resolve_count
        } else {
            0
        };

        for page in 1..=page_count {
            let entries = match self.feed.popular_page(medium, page).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(feed = %feed_source, medium = %medium, page, error = %e, "Popular page failed");
                    report.pages_failed += 1;
                    continue;
                }
            };
            report.pages_fetched += 1;

            if entries.is_empty() {
                debug!(feed = %feed_source, page, "Popular feed exhausted");
                break;
            }

            for entry in &entries {
                let Some(id) = self.feed.entry_id(entry) else {
                    report.entries_skipped += 1;
                    continue;
                };

                let names = self.cache_entry(medium, &id, entry).await;
                report.entries_cached += 1;

                if cross_budget > 0 && !names.is_empty() {
                    cross_budget -= 1;
                    if self.cross_resolve(medium, &names).await {
                        report.cross_resolved += 1;
                    } else {
                        report.cross_missed += 1;
                    }
                }
            }
        }

        info!(
            feed = %feed_source,
            medium = %medium,
            pages = report.pages_fetched,
            failed = report.pages_failed,
            cached = report.entries_cached,
            cross_resolved = report.cross_resolved,
            "Primed cache from popular feed"
        );
        Ok(report)
    }

    /// Store the entry and link every name to it. Returns the names.
    async fn cache_entry(&self, medium: Medium, id: &str, entry: &Document) -> Vec<String> {
        let source = self.feed.source();
        let cache = self.resolver.cache();

        cache.set_payload(id, medium, source, entry).await;
        let names = self.feed.synonyms(entry);
        for name in &names {
            cache.set_identifier(name, medium, source, id).await;
        }
        names
    }

    /// Resolve the entry's primary name against the secondary source
    async fn cross_resolve(&self, medium: Medium, names: &[String]) -> bool {
        let Some(secondary) = self.secondary else {
            return false;
        };
        let Some(primary_name) = names.first() else {
            return false;
        };

        let query = Query::new(primary_name.clone(), medium);
        let targets = [self.feed.source(), secondary];
        match self
            .resolver
            .resolve_seeded(&query, Some(&targets), names)
            .await
        {
            Ok(result) => result.contains_key(&secondary),
            Err(e) => {
                warn!(query = %primary_name, error = %e, "Cross-resolution failed");
                false
            }
        }
    }
}
