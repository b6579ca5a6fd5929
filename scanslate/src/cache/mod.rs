//! Content-addressed translation cache.
//!
//! Entries are keyed by a SHA-256 digest of the source text alone, so the same
//! text always lands on the same key regardless of which request produced it.
//! Every backend applies the same expiry rule on read: an entry is gone once
//! `now > created_at + ttl`.
//!
//! Two backends are available, selected by `CACHE_URL`:
//! - `memory`: a process-local LRU ([`MemoryCacheStore`])
//! - any libsql URL: a shared SQL table ([`SqlCacheStore`])

mod memory;
mod sql;

pub use memory::MemoryCacheStore;
pub use sql::SqlCacheStore;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::CacheConfig;
use crate::error::Result;

pub const CACHE_KEY_PREFIX: &str = "translation:";

/// Timestamps are kept at millisecond precision, the resolution of the stored record.
pub(crate) fn truncate_to_millis(time: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(time.timestamp_millis()).unwrap_or(time)
}

/// Namespaced hex digest used as the store key for `source_text`.
pub fn cache_key(source_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_text.as_bytes());
    format!("{CACHE_KEY_PREFIX}{:x}", hasher.finalize())
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub source_text: String,
    pub translation: String,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(
        source_text: &str,
        translation: &str,
        ttl: Duration,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key: cache_key(source_text),
            source_text: source_text.to_string(),
            translation: translation.to_string(),
            created_at: truncate_to_millis(created_at),
            ttl,
        }
    }

    /// `None` when the TTL is too large to represent, i.e. the entry never expires.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| self.created_at.checked_add_signed(ttl))
    }

    /// Strictly after the deadline: an entry read exactly at `created_at + ttl` is still live.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|deadline| now > deadline)
    }

    pub fn to_record(&self) -> CachedTranslation {
        CachedTranslation {
            text: self.source_text.clone(),
            translation: self.translation.clone(),
            timestamp: self.created_at.timestamp_millis() as f64 / 1000.0,
        }
    }
}

/// Wire form of a cached value: `{"text", "translation", "timestamp"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedTranslation {
    pub text: String,
    pub translation: String,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

impl CachedTranslation {
    pub fn into_entry(self, ttl: Duration) -> Option<CacheEntry> {
        let created_at = DateTime::from_timestamp_millis((self.timestamp * 1000.0).round() as i64)?;
        Some(CacheEntry {
            key: cache_key(&self.text),
            source_text: self.text,
            translation: self.translation,
            created_at,
            ttl,
        })
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn kind(&self) -> &'static str;

    /// Live entry for `source_text`, or `None` if absent or expired.
    async fn get(&self, source_text: &str) -> Result<Option<CacheEntry>>;

    /// Write or overwrite the entry for `source_text`. No-op when either string is empty.
    async fn put(&self, source_text: &str, translation: &str, ttl: Duration) -> Result<()>;

    /// Drop expired entries eagerly. Returns the number removed.
    async fn purge_expired(&self) -> Result<u64>;
}

/// Build the backend named by `config.url`.
pub async fn connect(config: &CacheConfig) -> Result<Arc<dyn CacheStore>> {
    if config.url.eq_ignore_ascii_case("memory") {
        tracing::info!(capacity = config.capacity, "Using in-memory translation cache");
        return Ok(Arc::new(MemoryCacheStore::new(config.capacity)));
    }

    tracing::info!(url = %config.url, "Using libsql translation cache");
    let store = SqlCacheStore::new(config).await?;
    Ok(Arc::new(store))
}
