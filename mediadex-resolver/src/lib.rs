//! # Mediadex Resolver
//!
//! Resolves a free-text title into documents from several independent
//! catalogs, backed by a persistent SQLite cache.
//!
//! **Architecture:**
//! - Cache store: identifier lookups, payload cache with TTL, title aliases
//! - Fuzzy matcher: candidate disambiguation shared by every adapter
//! - Source adapters: one per catalog, registered by [`Source`]
//! - Resolver: per-query orchestration and write-back
//! - Primer: pre-seeds the cache from a popular-titles feed

pub mod cache; // Fail-open cache store facade
pub mod db; // Raw cache table operations
pub mod error; // Resolver errors
pub mod matcher; // Fuzzy candidate matching
pub mod orchestrator; // Per-query resolution
pub mod primer; // Bulk cache pre-seeding
pub mod sources; // Catalog adapters

pub use crate::cache::CacheStore;
pub use crate::error::{ResolveError, ResolveResult};
pub use crate::orchestrator::{Query, ResolutionResult, Resolver, ResolverConfig};
pub use crate::primer::{PopularFeed, PrimeReport};
pub use crate::sources::{Document, SourceAdapter, SourceRegistry};
pub use mediadex_common::{Medium, Source};
