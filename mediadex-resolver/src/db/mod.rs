//! Raw cache table operations
//!
//! Free functions over a `SqlitePool`. Every error is returned to the caller;
//! the fail-open policy lives in [`crate::cache::CacheStore`].

pub mod identifiers;
pub mod misses;
pub mod payloads;
pub mod seed;
pub mod title_aliases;

/// Lookup key for a human-readable name.
///
/// Names compare case-insensitively (Unicode lowercase) with surrounding
/// whitespace ignored.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Current time as stored in `cached_at` columns
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
