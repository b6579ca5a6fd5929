use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;

use super::{cache_key, CacheEntry, CacheStore};
use crate::error::{Result, ScanslateError};

/// Thread-safe LRU translation cache with lazy expiry.
///
/// Uses the Arc<Mutex<>> pattern so clones share one cache across request tasks.
/// Expired entries are dropped when read; the LRU bound keeps memory flat when
/// they are never read again.
#[derive(Clone)]
pub struct MemoryCacheStore {
    cache: Arc<Mutex<LruCache<String, CacheEntry>>>,
}

impl MemoryCacheStore {
    /// A zero capacity is bumped to one entry.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, LruCache<String, CacheEntry>>> {
        self.cache
            .lock()
            .map_err(|_| ScanslateError::Cache("translation cache lock poisoned".to_string()))
    }

    pub(crate) fn get_at(&self, source_text: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>> {
        let key = cache_key(source_text);
        let mut cache = self.lock()?;

        let expired = match cache.peek(&key) {
            Some(entry) => entry.is_expired_at(now),
            None => return Ok(None),
        };

        if expired {
            cache.pop(&key);
            tracing::debug!(cache_key = %key, "Dropped expired cache entry");
            return Ok(None);
        }

        Ok(cache.get(&key).cloned())
    }

    pub(crate) fn put_at(
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
        let mut cache = self.lock()?;
        cache.put(entry.key.clone(), entry);
        Ok(())
    }

    pub(crate) fn purge_at(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut cache = self.lock()?;
        let expired: Vec<String> = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            cache.pop(key);
        }

        Ok(expired.len() as u64)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, source_text: &str) -> Result<Option<CacheEntry>> {
        self.get_at(source_text, Utc::now())
    }

    async fn put(&self, source_text: &str, translation: &str, ttl: Duration) -> Result<()> {
        self.put_at(source_text, translation, ttl, Utc::now())
    }

    async fn purge_expired(&self) -> Result<u64> {
        self.purge_at(Utc::now())
    }
}
