//! Cache store
//!
//! Fail-open facade over the [`crate::db`] table operations. Reads that hit a
//! storage error are logged and reported as misses; writes that fail are
//! logged and dropped. A broken database therefore degrades resolution to
//! "always fetch", it never aborts a query in progress.
//!
//! All operations are independent upserts keyed by natural primary keys, so
//! concurrent queries may share one store without extra locking.

use crate::db::{self, identifiers, misses, payloads, title_aliases};
use mediadex_common::{Medium, Result, Source};
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default payload lifetime
pub const DEFAULT_PAYLOAD_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct CacheStore {
    pool: SqlitePool,
    payload_ttl: Duration,
}

impl CacheStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_ttl(pool, DEFAULT_PAYLOAD_TTL)
    }

    pub fn with_ttl(pool: SqlitePool, payload_ttl: Duration) -> Self {
        Self { pool, payload_ttl }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn payload_ttl(&self) -> Duration {
        self.payload_ttl
    }

    pub async fn get_identifiers(
        &self,
        name: &str,
        medium: Medium,
    ) -> Option<HashMap<Source, String>> {
        match identifiers::get_identifiers(&self.pool, name, medium).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(name, medium = %medium, error = %e, "Identifier lookup failed, treating as miss");
                None
            }
        }
    }

    pub async fn set_identifier(&self, name: &str, medium: Medium, source: Source, id: &str) {
        if let Err(e) = identifiers::set_identifier(&self.pool, name, medium, source, id).await {
            warn!(name, medium = %medium, source = %source, error = %e, "Failed to store identifier");
        }
    }

    pub async fn get_payload(&self, id: &str, medium: Medium, source: Source) -> Option<Value> {
        match payloads::get_payload(&self.pool, id, medium, source, self.payload_ttl).await {
            Ok(Some(payload)) => {
                debug!(id, source = %source, medium = %medium, "Payload cache hit");
                Some(payload)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(id, source = %source, medium = %medium, error = %e, "Payload read failed, treating as miss");
                None
            }
        }
    }

    pub async fn set_payload(&self, id: &str, medium: Medium, source: Source, payload: &Value) {
        if let Err(e) = payloads::set_payload(&self.pool, id, medium, source, payload).await {
            warn!(id, source = %source, medium = %medium, error = %e, "Failed to store payload");
        }
    }

    pub async fn get_title_alias(&self, id: &str, medium: Medium) -> Option<String> {
        match title_aliases::get_title_alias(&self.pool, id, medium).await {
            Ok(title) => title,
            Err(e) => {
                warn!(id, medium = %medium, error = %e, "Title alias read failed, treating as miss");
                None
            }
        }
    }

    pub async fn set_title_alias(&self, id: &str, medium: Medium, title: &str) {
        if let Err(e) = title_aliases::set_title_alias(&self.pool, id, medium, title).await {
            warn!(id, medium = %medium, error = %e, "Failed to store title alias");
        }
    }

    /// Whether `source` recently answered "no match" for `name` when searched
    /// with every name in `synonyms`
    pub async fn is_recent_miss(
        &self,
        name: &str,
        medium: Medium,
        source: Source,
        synonyms: &[String],
    ) -> bool {
        let now = db::unix_now();
        match misses::is_recent_miss_at(&self.pool, name, medium, source, synonyms, now, self.payload_ttl)
            .await
        {
            Ok(hit) => hit,
            Err(e) => {
                warn!(name, source = %source, error = %e, "Miss lookup failed, treating as unknown");
                false
            }
        }
    }

    pub async fn record_miss(&self, name: &str, medium: Medium, source: Source, synonyms: &[String]) {
        let now = db::unix_now();
        if let Err(e) = misses::record_miss_at(&self.pool, name, medium, source, synonyms, now).await {
            warn!(name, source = %source, error = %e, "Failed to record lookup miss");
        }
    }

    /// Delete every expired payload and miss row.
    ///
    /// Maintenance only: reads already evict lazily. Errors are returned.
    pub async fn purge_expired(&self) -> Result<u64> {
        let now = db::unix_now();
        let mut removed = 0;
        for medium in Medium::ALL {
            removed += payloads::purge_expired(&self.pool, medium, now, self.payload_ttl).await?;
        }
        removed += misses::purge_expired(&self.pool, now, self.payload_ttl).await?;

        info!(removed, "Purged expired cache rows");
        Ok(removed)
    }
}
