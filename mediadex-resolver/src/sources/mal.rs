//! MyAnimeList v2 API adapter
//!
//! MyAnimeList's search is sensitive to exact phrasing, so the resolver keeps
//! each entry's canonical title. When an id is already known, the adapter
//! searches with that title and keeps the result carrying the id, falling
//! back to the direct entry endpoint.

use super::http::HttpClient;
use super::{id_field, push_name, str_field, Document, Resolved, SourceAdapter, SourceError};
use crate::matcher::{best_match_any, Candidate, MatchPolicy};
use async_trait::async_trait;
use mediadex_common::{Medium, Source};
use serde_json::Value;
use tracing::debug;

const MAL_API_URL: &str = "https://api.myanimelist.net/v2";
const SEARCH_LIMIT: u32 = 20;
/// Longest `q` the search endpoint accepts
const MAX_QUERY_CHARS: usize = 64;
/// Shortest `q` the search endpoint accepts
const MIN_QUERY_CHARS: usize = 3;

const FIELDS: &str = "id,title,main_picture,alternative_titles,start_date,end_date,synopsis,\
    mean,rank,popularity,media_type,status,genres,num_episodes,num_volumes,num_chapters";

const NOVEL_TYPES: [&str; 2] = ["light_novel", "novel"];

pub struct MalAdapter {
    http: HttpClient,
    client_id: String,
    base_url: String,
}

/// Endpoint kind for a medium
fn endpoint(medium: Medium) -> Result<&'static str, SourceError> {
    match medium {
        Medium::Anime => Ok("anime"),
        Medium::Manga | Medium::LightNovel => Ok("manga"),
        Medium::VisualNovel => Err(SourceError::Unsupported(medium)),
    }
}

/// Whether a node of the manga endpoint belongs to the requested medium
fn fits_medium(node: &Value, medium: Medium) -> bool {
    let media_type = str_field(node, "/media_type").unwrap_or_default();
    let is_novel = NOVEL_TYPES.contains(&media_type);
    match medium {
        Medium::Manga => !is_novel,
        Medium::LightNovel => is_novel,
        _ => true,
    }
}

struct MalEntry<'a>(&'a Value);

impl Candidate for MalEntry<'_> {
    fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = ["/title", "/alternative_titles/en", "/alternative_titles/ja"]
            .iter()
            .filter_map(|p| str_field(self.0, p))
            .collect();
        if let Some(synonyms) = self
            .0
            .pointer("/alternative_titles/synonyms")
            .and_then(Value::as_array)
        {
            names.extend(synonyms.iter().filter_map(Value::as_str));
        }
        names
    }

    fn is_abbreviated(&self) -> bool {
        str_field(self.0, "/media_type") == Some("one_shot")
    }
}

/// Nodes of a search response that belong to the medium
fn search_nodes(response: &Value, medium: Medium) -> Result<Vec<Value>, SourceError> {
    let data = response
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Parse("MyAnimeList response has no data array".to_string()))?;

    Ok(data
        .iter()
        .filter_map(|item| item.get("node"))
        .filter(|node| fits_medium(node, medium))
        .cloned()
        .collect())
}

fn select_node(
    nodes: Vec<Value>,
    query: &str,
    synonyms: &[String],
    policy: &MatchPolicy,
) -> Option<Resolved> {
    let candidates: Vec<MalEntry> = nodes.iter().map(MalEntry).collect();
    let queries = std::iter::once(query).chain(synonyms.iter().map(String::as_str));
    let index = best_match_any(queries, &candidates, policy)?;
    let document = nodes.into_iter().nth(index)?;
    let id = id_field(&document, "/id")?;
    Some(Resolved { id, document })
}

/// The `q` parameter for a query. Too short a query is an error rather than
/// an empty result so it never reads as "no match".
fn search_text(query: &str) -> Result<String, SourceError> {
    let text: String = query.trim().chars().take(MAX_QUERY_CHARS).collect();
    if text.chars().count() < MIN_QUERY_CHARS {
        return Err(SourceError::QueryTooShort(MIN_QUERY_CHARS));
    }
    Ok(text)
}

impl MalAdapter {
    pub fn new(http: HttpClient, client_id: String) -> Self {
        Self::with_base_url(http, client_id, MAL_API_URL)
    }

    pub fn with_base_url(http: HttpClient, client_id: String, base_url: &str) -> Self {
        Self {
            http,
            client_id,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn headers(&self) -> [(&'static str, String); 1] {
        [("X-MAL-CLIENT-ID", self.client_id.clone())]
    }

    async fn search(&self, medium: Medium, text: &str) -> Result<Vec<Value>, SourceError> {
        let text = search_text(text)?;
        let url = format!("{}/{}", self.base_url, endpoint(medium)?);
        let query = [
            ("q", text),
            ("limit", SEARCH_LIMIT.to_string()),
            ("fields", FIELDS.to_string()),
        ];
        let response: Value = self.http.get_json(&url, &query, &self.headers()).await?;
        search_nodes(&response, medium)
    }
}

#[async_trait]
impl SourceAdapter for MalAdapter {
    fn source(&self) -> Source {
        Source::MyAnimeList
    }

    fn policy(&self) -> MatchPolicy {
        MatchPolicy::STRUCTURED
    }

    async fn fetch_by_id(
        &self,
        medium: Medium,
        id: &str,
        title_hint: Option<&str>,
    ) -> Result<Option<Document>, SourceError> {
        if let Some(title) = title_hint {
            match self.search(medium, title).await {
                Ok(nodes) => {
                    let found = nodes
                        .into_iter()
                        .find(|node| id_field(node, "/id").as_deref() == Some(id));
                    if found.is_some() {
                        return Ok(found);
                    }
                }
                Err(e) => {
                    debug!(id, title, error = %e, "Title search failed, using entry endpoint");
                }
            }
        }

        let url = format!("{}/{}/{}", self.base_url, endpoint(medium)?, id);
        let query = [("fields", FIELDS.to_string())];
        match self.http.get_json::<Value>(&url, &query, &self.headers()).await {
            Ok(node) if fits_medium(&node, medium) => Ok(Some(node)),
            Ok(_) => Ok(None),
            Err(SourceError::Status(404)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn fetch_by_query(
        &self,
        medium: Medium,
        query: &str,
        synonyms: &[String],
    ) -> Result<Option<Resolved>, SourceError> {
        let nodes = self.search(medium, query).await?;
        Ok(select_node(nodes, query, synonyms, &self.policy()))
    }

    fn synonyms(&self, document: &Document) -> Vec<String> {
        let mut names = Vec::new();
        for name in MalEntry(document).names() {
            push_name(&mut names, name);
        }
        names
    }

    fn tracks_title_alias(&self) -> bool {
        true
    }

    fn canonical_title(&self, document: &Document) -> Option<String> {
        str_field(document, "/title").map(str::to_string)
    }
}
