use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use tubemood_core::{Clock, Comment, SystemClock, VideoMetadata};

/// Ten years; anything longer is treated as "never expires".
const MAX_TTL_SECONDS: u64 = 10 * 365 * 24 * 3600;

fn ttl_duration(ttl_seconds: u64) -> ChronoDuration {
    ChronoDuration::seconds(ttl_seconds.min(MAX_TTL_SECONDS) as i64)
}

/// A cached value together with the instant it was produced. Stored and
/// replaced as one unit so readers never pair a value with another value's timestamp.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    pub fn age(&self, now: DateTime<Utc>) -> ChronoDuration {
        now - self.created_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl_seconds: u64) -> bool {
        self.age(now) >= ttl_duration(ttl_seconds)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }

    fn merge(mut self, other: CacheStats) -> Self {
        self.hits += other.hits;
        self.misses += other.misses;
        self.stores += other.stores;
        self.entries += other.entries;
        self
    }
}

/// Keyed memo of produced values with a per-lookup time-to-live.
///
/// Two concurrent misses on the same key may both run their producer; the
/// later store wins.
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stores: AtomicU64::new(0),
        }
    }

    /// The cached value for `key` if it is younger than `ttl_seconds`.
    pub fn get(&self, key: &str, ttl_seconds: u64) -> Option<V> {
        let now = self.clock.now();
        let entry = self.entries.get(key)?;
        if entry.is_expired(now, ttl_seconds) {
            None
        } else {
            Some(entry.value.clone())
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        let entry = CacheEntry {
            value,
            created_at: self.clock.now(),
        };
        self.entries.insert(key.into(), entry);
        self.stores.fetch_add(1, Ordering::Relaxed);
    }

    /// Return the fresh cached value, or run `producer` and store its result.
    ///
    /// Producer errors are passed through and nothing is stored. The store
    /// happens only once the producer completes, so a dropped future leaves
    /// the cache untouched.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: &str,
        ttl_seconds: u64,
        producer: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key, ttl_seconds) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache hit for {}", key);
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Cache miss for {}", key);

        let value = producer().await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop every entry older than `ttl_seconds`; returns how many were removed.
    pub fn purge_expired(&self, ttl_seconds: u64) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !entry.is_expired(now, ttl_seconds));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.entries.len())
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}

/// The caches in front of each fetch operation.
#[derive(Debug)]
pub struct FetchCache {
    pub trending: TtlCache<Vec<VideoMetadata>>,
    pub videos: TtlCache<VideoMetadata>,
    pub comments: TtlCache<Vec<Comment>>,
}

impl FetchCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            trending: TtlCache::new(clock.clone()),
            videos: TtlCache::new(clock.clone()),
            comments: TtlCache::new(clock),
        }
    }

    pub fn trending_key(region: &str, count: u32) -> String {
        format!("trending:{}:{}", region, count)
    }

    pub fn video_key(video_id: &str) -> String {
        format!("video:{}", video_id)
    }

    pub fn comments_key(video_id: &str, max_comments: u32) -> String {
        format!("comments:{}:{}", video_id, max_comments)
    }

    pub fn clear(&self) {
        self.trending.clear();
        self.videos.clear();
        self.comments.clear();
    }

    pub fn purge_expired(&self, ttl_seconds: u64) -> usize {
        self.trending.purge_expired(ttl_seconds)
            + self.videos.purge_expired(ttl_seconds)
            + self.comments.purge_expired(ttl_seconds)
    }

    pub fn stats(&self) -> CacheStats {
        self.trending
            .stats()
            .merge(self.videos.stats())
            .merge(self.comments.stats())
    }
}

impl Default for FetchCache {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}
