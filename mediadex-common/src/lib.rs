//! # Mediadex Common Library
//!
//! Shared code for the mediadex resolver and its tools:
//! - Medium and catalog source enumerations (with the medium routing table)
//! - Error and result types
//! - Bootstrap configuration loading and root folder resolution
//! - SQLite pool initialization and cache schema

pub mod config;
pub mod db;
pub mod error;
pub mod media;

pub use error::{Error, Result};
pub use media::{Medium, Source};
