//! Novel Updates search listings

use super::listing::ListingSite;
use mediadex_common::{Medium, Source};
use once_cell::sync::Lazy;
use regex::Regex;

const BASE_URL: &str = "https://www.novelupdates.com";

static SERIES_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?://(?:www\.)?novelupdates\.com)?/series/([a-z0-9][a-z0-9-]*)/?$")
        .expect("novelupdates link pattern is valid")
});

pub struct NovelUpdates;

impl ListingSite for NovelUpdates {
    fn source(&self) -> Source {
        Source::NovelUpdates
    }

    fn search_request(&self, _medium: Medium, query: &str) -> (String, Vec<(&'static str, String)>) {
        (
            format!("{}/", BASE_URL),
            vec![("s", query.to_string()), ("post_type", "seriesplans".to_string())],
        )
    }

    fn entry_id(&self, _medium: Medium, href: &str) -> Option<String> {
        SERIES_LINK.captures(href).map(|caps| caps[1].to_string())
    }

    fn entry_url(&self, _medium: Medium, id: &str) -> String {
        format!("{}/series/{}/", BASE_URL, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::listing::extract_entries;

    #[test]
    fn test_search_results() {
        let html = r#"
            <div class="search_title"><a href="https://www.novelupdates.com/series/overlord-ln/">Overlord (LN)</a></div>
            <div class="search_title"><a href="https://www.novelupdates.com/series/overlord-wn/">Overlord (WN)</a></div>
            <a href="https://www.novelupdates.com/genre/action/">Action</a>
        "#;
        let entries = extract_entries(&NovelUpdates, Medium::LightNovel, html);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "overlord-ln");
        assert_eq!(entries[0].title, "Overlord (LN)");
        assert_eq!(
            NovelUpdates.entry_url(Medium::LightNovel, "overlord-ln"),
            "https://www.novelupdates.com/series/overlord-ln/"
        );
    }
}
