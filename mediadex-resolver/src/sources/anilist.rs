//! AniList GraphQL adapter
//!
//! Also serves as the popular-titles feed for the primer.

use super::http::HttpClient;
use super::{id_field, push_name, str_field, Document, Resolved, SourceAdapter, SourceError};
use crate::matcher::{best_match_any, Candidate, MatchPolicy};
use crate::primer::PopularFeed;
use async_trait::async_trait;
use mediadex_common::{Medium, Source};
use serde_json::{json, Value};

const ANILIST_URL: &str = "https://graphql.anilist.co";

/// Entries per popular page
pub const POPULAR_PAGE_SIZE: u32 = 40;

const MEDIA_FIELDS: &str = "id idMal type format status \
    title { romaji english native } synonyms \
    description(asHtml: false) startDate { year month day } \
    episodes chapters volumes averageScore popularity genres siteUrl \
    coverImage { large }";

pub struct AniListAdapter {
    http: HttpClient,
}

/// GraphQL filter values for a medium: (type, format, format_not)
fn media_filter(medium: Medium) -> Result<(&'static str, Option<&'static str>, Option<&'static str>), SourceError> {
    match medium {
        Medium::Anime => Ok(("ANIME", None, None)),
        Medium::Manga => Ok(("MANGA", None, Some("NOVEL"))),
        Medium::LightNovel => Ok(("MANGA", Some("NOVEL"), None)),
        Medium::VisualNovel => Err(SourceError::Unsupported(medium)),
    }
}

struct MediaEntry<'a>(&'a Value);

impl Candidate for MediaEntry<'_> {
    fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = ["/title/english", "/title/romaji", "/title/native"]
            .iter()
            .filter_map(|p| str_field(self.0, p))
            .collect();
        if let Some(synonyms) = self.0.get("synonyms").and_then(Value::as_array) {
            names.extend(synonyms.iter().filter_map(Value::as_str));
        }
        names
    }

    fn is_abbreviated(&self) -> bool {
        str_field(self.0, "/format") == Some("ONE_SHOT")
    }
}

/// The `media` array of a Page response
fn page_media(response: &Value) -> Result<Vec<Value>, SourceError> {
    response
        .pointer("/data/Page/media")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| SourceError::Parse("AniList response has no data.Page.media".to_string()))
}

fn select_media(
    media: Vec<Value>,
    query: &str,
    synonyms: &[String],
    policy: &MatchPolicy,
) -> Option<Resolved> {
    let candidates: Vec<MediaEntry> = media.iter().map(MediaEntry).collect();
    let queries = std::iter::once(query).chain(synonyms.iter().map(String::as_str));
    let index = best_match_any(queries, &candidates, policy)?;
    let document = media.into_iter().nth(index)?;
    let id = id_field(&document, "/id")?;
    Some(Resolved { id, document })
}

impl AniListAdapter {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn graphql(&self, query: String, variables: Value) -> Result<Value, SourceError> {
        let body = json!({ "query": query, "variables": variables });
        self.http.post_json(ANILIST_URL, &body, &[]).await
    }
}

#[async_trait]
impl SourceAdapter for AniListAdapter {
    fn source(&self) -> Source {
        Source::AniList
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
        let (media_type, _, _) = media_filter(medium)?;
        let id: i64 = id
            .parse()
            .map_err(|_| SourceError::Parse(format!("AniList id is not numeric: {}", id)))?;

        let query = format!(
            "query ($id: Int, $type: MediaType) {{ Media(id: $id, type: $type) {{ {} }} }}",
            MEDIA_FIELDS
        );
        let response = match self.graphql(query, json!({ "id": id, "type": media_type })).await {
            Ok(response) => response,
            Err(SourceError::Status(404)) => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(response
            .pointer("/data/Media")
            .filter(|media| !media.is_null())
            .cloned())
    }

    async fn fetch_by_query(
        &self,
        medium: Medium,
        query: &str,
        synonyms: &[String],
    ) -> Result<Option<Resolved>, SourceError> {
        let (media_type, format, format_not) = media_filter(medium)?;
        let graphql = format!(
            "query ($search: String, $type: MediaType, $format: MediaFormat, $formatNot: MediaFormat) \
             {{ Page(page: 1, perPage: {}) {{ media(search: $search, type: $type, format: $format, format_not: $formatNot) {{ {} }} }} }}",
            POPULAR_PAGE_SIZE, MEDIA_FIELDS
        );
        let variables = json!({
            "search": query,
            "type": media_type,
            "format": format,
            "formatNot": format_not,
        });

        let media = page_media(&self.graphql(graphql, variables).await?)?;
        Ok(select_media(media, query, synonyms, &self.policy()))
    }

    fn synonyms(&self, document: &Document) -> Vec<String> {
        let mut names = Vec::new();
        for name in MediaEntry(document).names() {
            push_name(&mut names, name);
        }
        names
    }
}

#[async_trait]
impl PopularFeed for AniListAdapter {
    fn feed_covers(&self, medium: Medium) -> bool {
        media_filter(medium).is_ok()
    }

    async fn popular_page(&self, medium: Medium, page: u32) -> Result<Vec<Document>, SourceError> {
        let (media_type, format, format_not) = media_filter(medium)?;
        let graphql = format!(
            "query ($page: Int, $perPage: Int, $type: MediaType, $format: MediaFormat, $formatNot: MediaFormat) \
             {{ Page(page: $page, perPage: $perPage) {{ media(type: $type, format: $format, format_not: $formatNot, sort: POPULARITY_DESC) {{ {} }} }} }}",
            MEDIA_FIELDS
        );
        let variables = json!({
            "page": page,
            "perPage": POPULAR_PAGE_SIZE,
            "type": media_type,
            "format": format,
            "formatNot": format_not,
        });

        page_media(&self.graphql(graphql, variables).await?)
    }

    fn entry_id(&self, entry: &Document) -> Option<String> {
        id_field(entry, "/id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> Value {
        json!({
            "data": {"Page": {"media": [
                {
                    "id": 20755,
                    "format": "ONE_SHOT",
                    "title": {"romaji": "Nisekoi", "english": null, "native": "ニセコイ"},
                    "synonyms": []
                },
                {
                    "id": 18897,
                    "format": "TV",
                    "title": {"romaji": "Nisekoi", "english": "Nisekoi: False Love", "native": "ニセコイ"},
                    "synonyms": ["Nisekoi (TV)"]
                }
            ]}}
        })
    }

    #[test]
    fn test_medium_filters() {
        assert_eq!(media_filter(Medium::Anime).unwrap(), ("ANIME", None, None));
        assert_eq!(media_filter(Medium::LightNovel).unwrap(), ("MANGA", Some("NOVEL"), None));
        assert_eq!(media_filter(Medium::Manga).unwrap(), ("MANGA", None, Some("NOVEL")));
        assert!(matches!(
            media_filter(Medium::VisualNovel),
            Err(SourceError::Unsupported(Medium::VisualNovel))
        ));
    }

    #[test]
    fn test_exact_title_short_circuits_before_penalty() {
        // The one-shot is listed first and scores 1.0, so it wins outright
        let media = page_media(&sample_page()).unwrap();
        let resolved = select_media(media, "nisekoi", &[], &MatchPolicy::STRUCTURED).unwrap();
        assert_eq!(resolved.id, "20755");
    }

    #[test]
    fn test_synonyms_extend_recall() {
        let media = page_media(&sample_page()).unwrap();
        let synonyms = vec!["Nisekoi: False Love".to_string()];
        let resolved =
            select_media(media, "False Love Nisekoi", &synonyms, &MatchPolicy::STRUCTURED).unwrap();
        assert_eq!(resolved.id, "18897");
    }

    #[test]
    fn test_missing_media_array_is_parse_error() {
        let response = json!({"errors": [{"message": "boom"}], "data": null});
        assert!(matches!(page_media(&response), Err(SourceError::Parse(_))));
    }

    #[test]
    fn test_document_synonyms() {
        let media = page_media(&sample_page()).unwrap();
        let entry = MediaEntry(&media[1]);
        assert_eq!(
            entry.names(),
            vec!["Nisekoi: False Love", "Nisekoi", "ニセコイ", "Nisekoi (TV)"]
        );
        assert!(!entry.is_abbreviated());
        assert!(MediaEntry(&media[0]).is_abbreviated());
    }
}
