//! Database pool and cache schema

pub mod init;

pub use init::{create_cache_tables, init_database, init_memory_database};
