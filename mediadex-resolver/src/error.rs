//! Resolver error types

use mediadex_common::{Medium, Source};
use thiserror::Error;

/// Errors the resolver raises to its caller.
///
/// Per-source and per-storage failures never show up here: they are logged
/// where they happen and the affected source is simply absent from the result.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The query itself cannot be resolved (e.g. blank text)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The popular feed does not list titles of this medium
    #[error("{feed} has no popular feed for {medium}")]
    UnsupportedMedium { feed: Source, medium: Medium },

    #[error(transparent)]
    Common(#[from] mediadex_common::Error),
}

pub type ResolveResult<T> = std::result::Result<T, ResolveError>;
