//! Adapter for catalogs that only offer HTML search pages
//!
//! A [`ListingSite`] describes where a catalog's search lives and how its
//! entry links look. [`ListingAdapter`] does the rest for every such site:
//! fetch the search page, pull `(id, title)` pairs out of the entry links,
//! handle searches that redirect straight to an entry, and pick the match.

use super::http::{HttpClient, Page};
use super::{push_name, str_field, Document, Resolved, SourceAdapter, SourceError};
use crate::matcher::{best_match_any, Candidate, MatchPolicy};
use async_trait::async_trait;
use mediadex_common::{Medium, Source};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::json;

static ANCHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#)
        .expect("anchor pattern is valid")
});
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern is valid"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));
static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("entity pattern is valid")
});
static OG_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta\s[^>]*property\s*=\s*["']og:url["'][^>]*content\s*=\s*["']([^"']+)["']"#)
        .expect("og:url pattern is valid")
});
static OG_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta\s[^>]*property\s*=\s*["']og:title["'][^>]*content\s*=\s*["']([^"']+)["']"#)
        .expect("og:title pattern is valid")
});

/// Where a catalog's search lives and what its entry links look like
pub trait ListingSite: Send + Sync + 'static {
    fn source(&self) -> Source;

    /// Search URL and query parameters
    fn search_request(&self, medium: Medium, query: &str) -> (String, Vec<(&'static str, String)>);

    /// Entry id if `href` (absolute or site-relative) links to an entry of `medium`
    fn entry_id(&self, medium: Medium, href: &str) -> Option<String>;

    fn entry_url(&self, medium: Medium, id: &str) -> String;
}

/// One entry link found on a search page
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    pub id: String,
    pub title: String,
}

impl Candidate for ListingEntry {
    fn names(&self) -> Vec<&str> {
        vec![self.title.as_str()]
    }
}

/// Replace HTML character references with the characters they stand for
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Visible text of an HTML fragment
fn inner_text(html: &str) -> String {
    let stripped = TAG.replace_all(html, " ");
    let decoded = decode_entities(&stripped);
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

/// Title guessed from an id slug (`"spice-and-wolf"` → `"spice and wolf"`)
fn title_from_slug(id: &str) -> String {
    id.replace(['-', '_'], " ").trim().to_string()
}

/// Every distinct entry linked from a page, first non-empty title per id
pub fn extract_entries<S: ListingSite + ?Sized>(site: &S, medium: Medium, html: &str) -> Vec<ListingEntry> {
    let mut entries: Vec<ListingEntry> = Vec::new();

    for caps in ANCHOR.captures_iter(html) {
        let href = decode_entities(&caps[1]);
        let Some(id) = site.entry_id(medium, href.trim()) else {
            continue;
        };
        let title = inner_text(&caps[2]);
        if title.is_empty() || entries.iter().any(|e| e.id == id) {
            continue;
        }
        entries.push(ListingEntry { id, title });
    }

    entries
}

/// The entry a search landed on when the site redirected to it directly
pub fn direct_hit<S: ListingSite + ?Sized>(site: &S, medium: Medium, page: &Page) -> Option<ListingEntry> {
    let id = site.entry_id(medium, &page.final_url).or_else(|| {
        OG_URL
            .captures(&page.body)
            .and_then(|caps| site.entry_id(medium, decode_entities(&caps[1]).trim()))
    })?;

    let title = OG_TITLE
        .captures(&page.body)
        .map(|caps| inner_text(&caps[1]))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| title_from_slug(&id));

    Some(ListingEntry { id, title })
}

pub struct ListingAdapter<S: ListingSite> {
    site: S,
    http: HttpClient,
}

impl<S: ListingSite> ListingAdapter<S> {
    pub fn new(site: S, http: HttpClient) -> Self {
        Self { site, http }
    }

    fn ensure_covered(&self, medium: Medium) -> Result<(), SourceError> {
        if self.site.source().covers(medium) {
            Ok(())
        } else {
            Err(SourceError::Unsupported(medium))
        }
    }

    fn document(&self, medium: Medium, entry: &ListingEntry) -> Document {
        json!({
            "id": entry.id,
            "title": entry.title,
            "url": self.site.entry_url(medium, &entry.id),
        })
    }
}

#[async_trait]
impl<S: ListingSite> SourceAdapter for ListingAdapter<S> {
    fn source(&self) -> Source {
        self.site.source()
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
        self.ensure_covered(medium)?;
        Ok(Some(json!({
            "id": id,
            "url": self.site.entry_url(medium, id),
        })))
    }

    async fn fetch_by_query(
        &self,
        medium: Medium,
        query: &str,
        synonyms: &[String],
    ) -> Result<Option<Resolved>, SourceError> {
        self.ensure_covered(medium)?;

        let (url, params) = self.site.search_request(medium, query.trim());
        let page = self.http.get_page(&url, &params).await?;

        let entries = match direct_hit(&self.site, medium, &page) {
            Some(entry) => vec![entry],
            None => extract_entries(&self.site, medium, &page.body),
        };

        let queries = std::iter::once(query).chain(synonyms.iter().map(String::as_str));
        let Some(index) = best_match_any(queries, &entries, &self.policy()) else {
            return Ok(None);
        };

        let entry = &entries[index];
        Ok(Some(Resolved {
            id: entry.id.clone(),
            document: self.document(medium, entry),
        }))
    }

    fn synonyms(&self, document: &Document) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(title) = str_field(document, "/title") {
            push_name(&mut names, title);
        }
        names
    }
}
