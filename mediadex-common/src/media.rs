//! Media kinds and catalog sources
//!
//! Both enumerations are persisted as small integers. The codes are part of
//! the on-disk format and must never be renumbered.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Kind of media a title belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Medium {
    Anime,
    Manga,
    LightNovel,
    VisualNovel,
}

impl Medium {
    pub const ALL: [Medium; 4] = [
        Medium::Anime,
        Medium::Manga,
        Medium::LightNovel,
        Medium::VisualNovel,
    ];

    /// Persisted integer code
    pub fn code(self) -> i64 {
        match self {
            Medium::Anime => 1,
            Medium::Manga => 2,
            Medium::LightNovel => 3,
            Medium::VisualNovel => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Medium::Anime => "anime",
            Medium::Manga => "manga",
            Medium::LightNovel => "light_novel",
            Medium::VisualNovel => "visual_novel",
        }
    }

    /// Name of the payload table holding documents of this medium
    pub fn payload_table(self) -> &'static str {
        match self {
            Medium::Anime => "anime_payload",
            Medium::Manga => "manga_payload",
            Medium::LightNovel => "light_novel_payload",
            Medium::VisualNovel => "visual_novel_payload",
        }
    }
}

impl fmt::Display for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Medium {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anime" => Ok(Medium::Anime),
            "manga" => Ok(Medium::Manga),
            "light_novel" | "light-novel" | "ln" => Ok(Medium::LightNovel),
            "visual_novel" | "visual-novel" | "vn" => Ok(Medium::VisualNovel),
            other => Err(Error::InvalidInput(format!("Unknown medium: {}", other))),
        }
    }
}

/// Catalog site a document or identifier comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "mal")]
    MyAnimeList,
    #[serde(rename = "anilist")]
    AniList,
    #[serde(rename = "animeplanet")]
    AnimePlanet,
    #[serde(rename = "anidb")]
    AniDb,
    #[serde(rename = "kitsu")]
    Kitsu,
    #[serde(rename = "mangaupdates")]
    MangaUpdates,
    #[serde(rename = "lndb")]
    Lndb,
    #[serde(rename = "novelupdates")]
    NovelUpdates,
    #[serde(rename = "vndb")]
    Vndb,
}

impl Source {
    /// Default resolution order
    pub const ALL: [Source; 9] = [
        Source::MyAnimeList,
        Source::AniList,
        Source::AnimePlanet,
        Source::AniDb,
        Source::Kitsu,
        Source::MangaUpdates,
        Source::Lndb,
        Source::NovelUpdates,
        Source::Vndb,
    ];

    /// Persisted integer code
    pub fn code(self) -> i64 {
        match self {
            Source::MyAnimeList => 1,
            Source::AniList => 2,
            Source::AnimePlanet => 3,
            Source::AniDb => 4,
            Source::Kitsu => 5,
            Source::MangaUpdates => 6,
            Source::Lndb => 7,
            Source::NovelUpdates => 8,
            Source::Vndb => 9,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Source::MyAnimeList => "mal",
            Source::AniList => "anilist",
            Source::AnimePlanet => "animeplanet",
            Source::AniDb => "anidb",
            Source::Kitsu => "kitsu",
            Source::MangaUpdates => "mangaupdates",
            Source::Lndb => "lndb",
            Source::NovelUpdates => "novelupdates",
            Source::Vndb => "vndb",
        }
    }

    /// Whether this catalog lists titles of the given medium.
    ///
    /// The resolver never calls an adapter for a combination this returns
    /// `false` for.
    pub fn covers(self, medium: Medium) -> bool {
        use Medium::*;
        match self {
            Source::MyAnimeList | Source::AniList | Source::Kitsu => {
                matches!(medium, Anime | Manga | LightNovel)
            }
            Source::AniDb => medium == Anime,
            Source::AnimePlanet => matches!(medium, Anime | Manga),
            Source::MangaUpdates => medium == Manga,
            Source::Lndb | Source::NovelUpdates => medium == LightNovel,
            Source::Vndb => medium == VisualNovel,
        }
    }

    /// Sources covering a medium, in default resolution order
    pub fn for_medium(medium: Medium) -> impl Iterator<Item = Source> {
        Self::ALL.into_iter().filter(move |s| s.covers(medium))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "");
        match wanted.as_str() {
            "myanimelist" => return Ok(Source::MyAnimeList),
            "animeplanet" | "ap" => return Ok(Source::AnimePlanet),
            "novelupdates" | "nu" => return Ok(Source::NovelUpdates),
            "mangaupdates" | "mu" => return Ok(Source::MangaUpdates),
            _ => {}
        }
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == wanted)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown source: {}", s.trim())))
    }
}
