//! Fuzzy candidate matching
//!
//! Every adapter picks its search result through [`best_match`] with its own
//! [`MatchPolicy`]. The steps are fixed:
//!
//! 1. Lowercase and trim the query and every candidate name.
//! 2. Score each candidate as the best [`ratio`] over its names.
//! 3. The first candidate scoring at least `exact_cutoff` wins outright.
//! 4. Abbreviated (one-shot) candidates lose `abbreviated_penalty`.
//! 5. The highest remaining score at or above `threshold` wins; ties keep the
//!    earlier candidate.
//! 6. Otherwise there is no match.

pub mod similarity;

pub use similarity::ratio;

/// Absorbs float error in `score - penalty` so a score sitting exactly on the
/// threshold is accepted
const SCORE_TOLERANCE: f64 = 1e-9;

/// Per-source acceptance settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    pub threshold: f64,
    pub abbreviated_penalty: f64,
    pub exact_cutoff: f64,
}

impl MatchPolicy {
    /// Search results from JSON APIs
    pub const STRUCTURED: MatchPolicy = MatchPolicy {
        threshold: 0.90,
        abbreviated_penalty: 0.05,
        exact_cutoff: 0.99,
    };

    /// Scraped listings and title dumps
    pub const LISTING: MatchPolicy = MatchPolicy {
        threshold: 0.85,
        abbreviated_penalty: 0.05,
        exact_cutoff: 0.99,
    };

    pub const fn with_threshold(self, threshold: f64) -> Self {
        Self { threshold, ..self }
    }
}

/// Something with one or more titles to match against
pub trait Candidate {
    fn names(&self) -> Vec<&str>;

    /// One-shot or otherwise abbreviated format
    fn is_abbreviated(&self) -> bool {
        false
    }
}

/// Candidate built from plain strings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedCandidate {
    pub names: Vec<String>,
    pub abbreviated: bool,
}

impl NamedCandidate {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            abbreviated: false,
        }
    }

    pub fn abbreviated(mut self, abbreviated: bool) -> Self {
        self.abbreviated = abbreviated;
        self
    }
}

impl Candidate for NamedCandidate {
    fn names(&self) -> Vec<&str> {
        self.names.iter().map(String::as_str).collect()
    }

    fn is_abbreviated(&self) -> bool {
        self.abbreviated
    }
}

pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Best similarity between an already-normalized query and any candidate name
pub fn score<C: Candidate + ?Sized>(normalized_query: &str, candidate: &C) -> f64 {
    candidate
        .names()
        .into_iter()
        .filter(|name| !name.trim().is_empty())
        .map(|name| ratio(normalized_query, &normalize(name)))
        .fold(0.0, f64::max)
}

/// Pick a winner from precomputed `(score, abbreviated)` pairs
pub fn select(scores: &[(f64, bool)], policy: &MatchPolicy) -> Option<usize> {
    if let Some(exact) = scores.iter().position(|(s, _)| *s >= policy.exact_cutoff) {
        return Some(exact);
    }

    let mut best: Option<(usize, f64)> = None;
    for (index, &(score, abbreviated)) in scores.iter().enumerate() {
        let effective = if abbreviated {
            score - policy.abbreviated_penalty
        } else {
            score
        };

        if effective + SCORE_TOLERANCE < policy.threshold {
            continue;
        }

        match best {
            Some((_, best_score)) if effective <= best_score => {}
            _ => best = Some((index, effective)),
        }
    }

    best.map(|(index, _)| index)
}

/// Index of the candidate matching `query`, if any
pub fn best_match<C: Candidate>(query: &str, candidates: &[C], policy: &MatchPolicy) -> Option<usize> {
    let query = normalize(query);
    if query.is_empty() || candidates.is_empty() {
        return None;
    }

    let scores: Vec<(f64, bool)> = candidates
        .iter()
        .map(|c| (score(&query, c), c.is_abbreviated()))
        .collect();

    select(&scores, policy)
}

/// Try each query in order (query text first, then synonyms) and return the
/// first one that matches
pub fn best_match_any<'q, C, I>(queries: I, candidates: &[C], policy: &MatchPolicy) -> Option<usize>
where
    C: Candidate,
    I: IntoIterator<Item = &'q str>,
{
    let mut tried: Vec<String> = Vec::new();
    for query in queries {
        let normalized = normalize(query);
        if normalized.is_empty() || tried.contains(&normalized) {
            continue;
        }
        if let Some(index) = best_match(&normalized, candidates, policy) {
            return Some(index);
        }
        tried.push(normalized);
    }
    None
}
