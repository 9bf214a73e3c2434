//! LNDB search listings

use super::listing::ListingSite;
use mediadex_common::{Medium, Source};
use once_cell::sync::Lazy;
use regex::Regex;

const BASE_URL: &str = "http://lndb.info";

static NOVEL_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?://(?:www\.)?lndb\.info)?/light_novel/([^/?#]+)/?$")
        .expect("lndb link pattern is valid")
});

pub struct Lndb;

impl ListingSite for Lndb {
    fn source(&self) -> Source {
        Source::Lndb
    }

    fn search_request(&self, _medium: Medium, query: &str) -> (String, Vec<(&'static str, String)>) {
        (format!("{}/search", BASE_URL), vec![("text", query.to_string())])
    }

    fn entry_id(&self, _medium: Medium, href: &str) -> Option<String> {
        NOVEL_LINK.captures(href).map(|caps| caps[1].to_string())
    }

    fn entry_url(&self, _medium: Medium, id: &str) -> String {
        format!("{}/light_novel/{}", BASE_URL, id)
    }
}
