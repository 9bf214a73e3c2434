//! VNDB Kana API adapter

use super::http::HttpClient;
use super::{id_field, push_name, str_field, Document, Resolved, SourceAdapter, SourceError};
use crate::matcher::{best_match_any, Candidate, MatchPolicy};
use async_trait::async_trait;
use mediadex_common::{Medium, Source};
use serde_json::{json, Value};

const VNDB_VN_URL: &str = "https://api.vndb.org/kana/vn";
const RESULT_LIMIT: u32 = 25;
const FIELDS: &str =
    "title, alttitle, aliases, titles.title, released, olang, description, rating, image.url";

pub struct VndbAdapter {
    http: HttpClient,
}

struct VnEntry<'a>(&'a Value);

impl Candidate for VnEntry<'_> {
    fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = ["/title", "/alttitle"]
            .iter()
            .filter_map(|p| str_field(self.0, p))
            .collect();
        if let Some(aliases) = self.0.get("aliases").and_then(Value::as_array) {
            names.extend(aliases.iter().filter_map(Value::as_str));
        }
        if let Some(titles) = self.0.get("titles").and_then(Value::as_array) {
            names.extend(titles.iter().filter_map(|t| str_field(t, "/title")));
        }
        names
    }
}

fn results(response: &Value) -> Result<Vec<Value>, SourceError> {
    response
        .get("results")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| SourceError::Parse("VNDB response has no results array".to_string()))
}

fn select_result(
    entries: Vec<Value>,
    query: &str,
    synonyms: &[String],
    policy: &MatchPolicy,
) -> Option<Resolved> {
    let candidates: Vec<VnEntry> = entries.iter().map(VnEntry).collect();
    let queries = std::iter::once(query).chain(synonyms.iter().map(String::as_str));
    let index = best_match_any(queries, &candidates, policy)?;
    let document = entries.into_iter().nth(index)?;
    let id = id_field(&document, "/id")?;
    Some(Resolved { id, document })
}

impl VndbAdapter {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn query(&self, filters: Value) -> Result<Vec<Value>, SourceError> {
        let body = json!({
            "filters": filters,
            "fields": FIELDS,
            "results": RESULT_LIMIT,
        });
        let response: Value = self.http.post_json(VNDB_VN_URL, &body, &[]).await?;
        results(&response)
    }
}

fn ensure_visual_novel(medium: Medium) -> Result<(), SourceError> {
    if medium == Medium::VisualNovel {
        Ok(())
    } else {
        Err(SourceError::Unsupported(medium))
    }
}

#[async_trait]
impl SourceAdapter for VndbAdapter {
    fn source(&self) -> Source {
        Source::Vndb
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
        ensure_visual_novel(medium)?;
        let found = self.query(json!(["id", "=", id])).await?;
        Ok(found.into_iter().next())
    }

    async fn fetch_by_query(
        &self,
        medium: Medium,
        query: &str,
        synonyms: &[String],
    ) -> Result<Option<Resolved>, SourceError> {
        ensure_visual_novel(medium)?;
        let entries = self.query(json!(["search", "=", query.trim()])).await?;
        Ok(select_result(entries, query, synonyms, &self.policy()))
    }

    fn synonyms(&self, document: &Document) -> Vec<String> {
        let mut names = Vec::new();
        for name in VnEntry(document).names() {
            push_name(&mut names, name);
        }
        names
    }
}
