//! MangaUpdates search listings

use super::listing::ListingSite;
use mediadex_common::{Medium, Source};
use once_cell::sync::Lazy;
use regex::Regex;

const BASE_URL: &str = "https://www.mangaupdates.com";

static SERIES_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?://(?:www\.)?mangaupdates\.com)?/series/([a-z0-9]+)(?:/[^?#]*)?$")
        .expect("mangaupdates link pattern is valid")
});
// Older numeric links still appear on some pages
static LEGACY_SERIES_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?://(?:www\.)?mangaupdates\.com)?/series\.html\?id=([0-9]+)$")
        .expect("legacy mangaupdates link pattern is valid")
});

pub struct MangaUpdates;

impl ListingSite for MangaUpdates {
    fn source(&self) -> Source {
        Source::MangaUpdates
    }

    fn search_request(&self, _medium: Medium, query: &str) -> (String, Vec<(&'static str, String)>) {
        (
            format!("{}/series.html", BASE_URL),
            vec![("search", query.to_string())],
        )
    }

    fn entry_id(&self, _medium: Medium, href: &str) -> Option<String> {
        SERIES_LINK
            .captures(href)
            .or_else(|| LEGACY_SERIES_LINK.captures(href))
            .map(|caps| caps[1].to_string())
    }

    fn entry_url(&self, _medium: Medium, id: &str) -> String {
        format!("{}/series/{}", BASE_URL, id)
    }
}
