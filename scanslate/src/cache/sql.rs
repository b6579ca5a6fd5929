use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{params, Builder, Connection};

use super::{cache_key, CacheEntry, CacheStore, CachedTranslation};
use crate::config::CacheConfig;
use crate::error::Result;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS translation_cache (
    cache_key TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    ttl_secs INTEGER NOT NULL,
    expires_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_translation_cache_expires_at ON translation_cache(expires_at);
"#;

/// Translation cache shared through a libsql database.
///
/// Local files, remote libsql servers and embedded replicas all work; the
/// stored payload is the JSON record `{text, translation, timestamp}`.
/// `expires_at` is unix milliseconds, NULL for entries that never expire.
#[derive(Clone)]
pub struct SqlCacheStore {
    conn: Connection,
}

impl SqlCacheStore {
    pub async fn new(config: &CacheConfig) -> Result<Self> {
        let url = config.url.as_str();
        let db = if url.starts_with("libsql://") || url.starts_with("https://") {
            Builder::new_remote(
                url.to_string(),
                config.auth_token.clone().unwrap_or_default(),
            )
            .build()
            .await?
        } else {
            let path = url.strip_prefix("file:").unwrap_or(url);
            Builder::new_local(path).build().await?
        };

        let conn = db.connect()?;
        conn.execute_batch(SCHEMA).await?;

        Ok(Self { conn })
    }

    pub(crate) async fn get_at(
        &self,
        source_text: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>> {
        let key = cache_key(source_text);
        let mut rows = self
            .conn
            .query(
                "SELECT payload, ttl_secs FROM translation_cache WHERE cache_key = ?1",
                params![key.clone()],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };

        let payload: String = row.get(0)?;
        let ttl_secs: i64 = row.get(1)?;

        let record: CachedTranslation = serde_json::from_str(&payload)?;
        let Some(entry) = record.into_entry(Duration::from_secs(ttl_secs.max(0) as u64)) else {
            tracing::warn!(cache_key = %key, "Discarding cache entry with invalid timestamp");
            return Ok(None);
        };

        // A digest match with different text means the row is not ours.
        if entry.source_text != source_text {
            return Ok(None);
        }

        if entry.is_expired_at(now) {
            if let Err(e) = self.delete_if_expired(&key, now).await {
                tracing::debug!(cache_key = %key, error = %e, "Failed to delete expired entry");
            }
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// The expiry check is repeated in SQL so a row rewritten since the read survives.
    async fn delete_if_expired(&self, key: &str, now: DateTime<Utc>) -> Result<u64> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM translation_cache WHERE cache_key = ?1 AND expires_at IS NOT NULL AND expires_at < ?2",
                params![key.to_string(), now.timestamp_millis()],
            )
            .await?;
        Ok(removed)
    }

    pub(crate) async fn put_at(
        &self,
        source_text: &str,
        translation: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if source_text.is_empty() || translation.is_empty() {
            return Ok(());
        }

        let entry = CacheEntry::new(source_text, translation, ttl, now);
        let payload = serde_json::to_string(&entry.to_record())?;
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_at = entry.expires_at().map(|deadline| deadline.timestamp_millis());

        self.conn
            .execute(
                r#"
                INSERT INTO translation_cache (cache_key, payload, ttl_secs, expires_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(cache_key) DO UPDATE SET
                    payload = excluded.payload,
                    ttl_secs = excluded.ttl_secs,
                    expires_at = excluded.expires_at
                "#,
                params![entry.key, payload, ttl_secs, expires_at],
            )
            .await?;

        Ok(())
    }

    pub(crate) async fn purge_at(&self, now: DateTime<Utc>) -> Result<u64> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM translation_cache WHERE expires_at IS NOT NULL AND expires_at < ?1",
                params![now.timestamp_millis()],
            )
            .await?;
        Ok(removed)
    }
}

#[async_trait]
impl CacheStore for SqlCacheStore {
    fn kind(&self) -> &'static str {
        "libsql"
    }

    async fn get(&self, source_text: &str) -> Result<Option<CacheEntry>> {
        self.get_at(source_text, Utc::now()).await
    }

    async fn put(&self, source_text: &str, translation: &str, ttl: Duration) -> Result<()> {
        self.put_at(source_text, translation, ttl, Utc::now()).await
    }

    async fn purge_expired(&self) -> Result<u64> {
        self.purge_at(Utc::now()).await
    }
}
