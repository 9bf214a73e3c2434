//! Kitsu JSON:API adapter

use super::http::HttpClient;
use super::{id_field, push_name, str_field, Document, Resolved, SourceAdapter, SourceError};
use crate::matcher::{best_match_any, Candidate, MatchPolicy};
use async_trait::async_trait;
use mediadex_common::{Medium, Source};
use serde_json::Value;

const KITSU_API_URL: &str = "https://kitsu.io/api/edge";
const PAGE_LIMIT: u32 = 20;

pub struct KitsuAdapter {
    http: HttpClient,
}

fn endpoint(medium: Medium) -> Result<&'static str, SourceError> {
    match medium {
        Medium::Anime => Ok("anime"),
        Medium::Manga | Medium::LightNovel => Ok("manga"),
        Medium::VisualNovel => Err(SourceError::Unsupported(medium)),
    }
}

fn fits_medium(entry: &Value, medium: Medium) -> bool {
    let is_novel = str_field(entry, "/attributes/subtype") == Some("novel");
    match medium {
        Medium::Manga => !is_novel,
        Medium::LightNovel => is_novel,
        _ => true,
    }
}

struct KitsuEntry<'a>(&'a Value);

impl Candidate for KitsuEntry<'_> {
    fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = str_field(self.0, "/attributes/canonicalTitle")
            .into_iter()
            .collect();
        if let Some(titles) = self.0.pointer("/attributes/titles").and_then(Value::as_object) {
            names.extend(titles.values().filter_map(Value::as_str));
        }
        if let Some(abbreviated) = self
            .0
            .pointer("/attributes/abbreviatedTitles")
            .and_then(Value::as_array)
        {
            names.extend(abbreviated.iter().filter_map(Value::as_str));
        }
        names
    }

    fn is_abbreviated(&self) -> bool {
        str_field(self.0, "/attributes/subtype") == Some("oneshot")
    }
}

fn search_entries(response: &Value, medium: Medium) -> Result<Vec<Value>, SourceError> {
    let data = response
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Parse("Kitsu response has no data array".to_string()))?;

    Ok(data
        .iter()
        .filter(|entry| fits_medium(entry, medium))
        .cloned()
        .collect())
}

fn select_entry(
    entries: Vec<Value>,
    query: &str,
    synonyms: &[String],
    policy: &MatchPolicy,
) -> Option<Resolved> {
    let candidates: Vec<KitsuEntry> = entries.iter().map(KitsuEntry).collect();
    let queries = std::iter::once(query).chain(synonyms.iter().map(String::as_str));
    let index = best_match_any(queries, &candidates, policy)?;
    let document = entries.into_iter().nth(index)?;
    let id = id_field(&document, "/id")?;
    Some(Resolved { id, document })
}

impl KitsuAdapter {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    fn headers() -> [(&'static str, String); 1] {
        [("Accept", "application/vnd.api+json".to_string())]
    }
}

#[async_trait]
impl SourceAdapter for KitsuAdapter {
    fn source(&self) -> Source {
        Source::Kitsu
    }

    fn policy(&self) -> MatchPolicy {
        MatchPolicy::STRUCTURED
    }

    async fn fetch_by_id(
        &self,
        medium: Medium,
        id: &str,
        _title_hint: Option<&str>,
    ) -> Result<Option<Document>, SourceError> {
        let url = format!("{}/{}/{}", KITSU_API_URL, endpoint(medium)?, id);
        match self.http.get_json::<Value>(&url, &[], &Self::headers()).await {
            Ok(response) => Ok(response
                .get("data")
                .filter(|entry| entry.is_object() && fits_medium(entry, medium))
                .cloned()),
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
        let url = format!("{}/{}", KITSU_API_URL, endpoint(medium)?);
        let mut params = vec![
            ("filter[text]", query.trim().to_string()),
            ("page[limit]", PAGE_LIMIT.to_string()),
        ];
        if medium == Medium::LightNovel {
            params.push(("filter[subtype]", "novel".to_string()));
        }

        let response: Value = self.http.get_json(&url, &params, &Self::headers()).await?;
        let entries = search_entries(&response, medium)?;
        Ok(select_entry(entries, query, synonyms, &self.policy()))
    }

    fn synonyms(&self, document: &Document) -> Vec<String> {
        let mut names = Vec::new();
        for name in KitsuEntry(document).names() {
            push_name(&mut names, name);
        }
        names
    }
}
