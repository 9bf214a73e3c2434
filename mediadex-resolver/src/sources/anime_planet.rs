//! Anime-Planet search listings

use super::listing::ListingSite;
use mediadex_common::{Medium, Source};
use once_cell::sync::Lazy;
use regex::Regex;

const BASE_URL: &str = "https://www.anime-planet.com";

static ENTRY_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?://(?:www\.)?anime-planet\.com)?/(anime|manga)/([a-z0-9][a-z0-9-]*)/?$")
        .expect("anime-planet link pattern is valid")
});

/// Section pages that share the entry URL shape
const RESERVED_SLUGS: &[&str] = &[
    "all",
    "characters",
    "genres",
    "latest",
    "light-novels",
    "magazines",
    "publishers",
    "read-online",
    "recommendations",
    "reviews",
    "seasons",
    "studios",
    "tags",
    "top-anime",
    "top-manga",
    "watch-online",
    "webtoons",
];

pub struct AnimePlanet;

fn section(medium: Medium) -> &'static str {
    match medium {
        Medium::Manga => "manga",
        _ => "anime",
    }
}

impl ListingSite for AnimePlanet {
    fn source(&self) -> Source {
        Source::AnimePlanet
    }

    fn search_request(&self, medium: Medium, query: &str) -> (String, Vec<(&'static str, String)>) {
        (
            format!("{}/{}/all", BASE_URL, section(medium)),
            vec![("name", query.to_string())],
        )
    }

    fn entry_id(&self, medium: Medium, href: &str) -> Option<String> {
        let caps = ENTRY_LINK.captures(href)?;
        let slug = &caps[2];
        if &caps[1] != section(medium) || RESERVED_SLUGS.contains(&slug) {
            return None;
        }
        Some(slug.to_string())
    }

    fn entry_url(&self, medium: Medium, id: &str) -> String {
        format!("{}/{}/{}", BASE_URL, section(medium), id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::listing::extract_entries;

    #[test]
    fn test_entry_links_by_section() {
        let site = AnimePlanet;
        assert_eq!(
            site.entry_id(Medium::Anime, "/anime/nisekoi").as_deref(),
            Some("nisekoi")
        );
        assert_eq!(
            site.entry_id(Medium::Anime, "https://www.anime-planet.com/anime/nisekoi-2/").as_deref(),
            Some("nisekoi-2")
        );
        assert_eq!(site.entry_id(Medium::Manga, "/anime/nisekoi"), None);
        assert_eq!(site.entry_id(Medium::Anime, "/anime/top-anime"), None);
        assert_eq!(site.entry_id(Medium::Anime, "/anime/all?name=nisekoi"), None);
    }

    #[test]
    fn test_search_page_extraction() {
        let html = r#"
            <a href="/anime/all?name=nisekoi">All</a>
            <li class="card"><a href="/anime/nisekoi" title="Nisekoi"><h3 class="cardName">Nisekoi</h3></a></li>
            <li class="card"><a href="/anime/nisekoi-2"><h3 class="cardName">Nisekoi 2</h3></a></li>
        "#;
        let entries = extract_entries(&AnimePlanet, Medium::Anime, html);
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["nisekoi", "nisekoi-2"]);
    }

    #[test]
    fn test_urls() {
        let (url, params) = AnimePlanet.search_request(Medium::Manga, "Nisekoi");
        assert_eq!(url, "https://www.anime-planet.com/manga/all");
        assert_eq!(params, vec![("name", "Nisekoi".to_string())]);
        assert_eq!(
            AnimePlanet.entry_url(Medium::Anime, "nisekoi"),
            "https://www.anime-planet.com/anime/nisekoi"
        );
    }
}
