use async_trait::async_trait;
use common::cache_key::CacheKey;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;

use super::{CacheStore, CachedArtifact};
use crate::error::CacheError;

#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    /// Maximum number of stored thumbnails
    pub max_items: usize,
    /// Maximum total size in bytes (0 = unlimited)
    pub max_size_bytes: usize,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_items: 10_000,
            max_size_bytes: 512 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub inserts: u64,
}

#[derive(Default)]
struct Inner {
    items: HashMap<CacheKey, CachedArtifact>,
    /// Least recently used at the front
    lru_queue: VecDeque<CacheKey>,
    current_size: usize,
    stats: CacheStats,
}

impl Inner {
    fn touch(&mut self, key: &CacheKey) {
        self.lru_queue.retain(|k| k != key);
        self.lru_queue.push_back(key.clone());
    }

    fn evict_oldest(&mut self) -> bool {
        match self.lru_queue.pop_front() {
            Some(key) => {
                if let Some(artifact) = self.items.remove(&key) {
                    self.current_size = self.current_size.saturating_sub(artifact.size());
                    self.stats.evictions += 1;
                }
                true
            }
            None => false,
        }
    }
}

/// Process-local LRU cache store bounded by item count and total bytes
pub struct MemoryCacheStore {
    config: MemoryCacheConfig,
    inner: RwLock<Inner>,
}

impl MemoryCacheStore {
    pub fn new(config: MemoryCacheConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.read().await.stats.clone()
    }

    pub async fn current_size(&self) -> usize {
        self.inner.read().await.current_size
    }

    pub async fn item_count(&self) -> usize {
        self.inner.read().await.items.len()
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.items.clear();
        inner.lru_queue.clear();
        inner.current_size = 0;
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(MemoryCacheConfig::default())
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedArtifact>, CacheError> {
        let mut inner = self.inner.write().await;

        match inner.items.get(key).cloned() {
            Some(artifact) => {
                inner.touch(key);
                inner.stats.hits += 1;
                Ok(Some(artifact))
            }
            None => {
                inner.stats.misses += 1;
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &CacheKey, artifact: CachedArtifact) -> Result<(), CacheError> {
        let size = artifact.size();
        if self.config.max_size_bytes > 0 && size > self.config.max_size_bytes {
            debug!(cache_key = %key, size, "artifact larger than memory cache, not stored");
            return Ok(());
        }

        let mut inner = self.inner.write().await;

        if let Some(old) = inner.items.remove(key) {
            inner.current_size = inner.current_size.saturating_sub(old.size());
            inner.lru_queue.retain(|k| k != key);
        }

        while inner.items.len() >= self.config.max_items.max(1) && inner.evict_oldest() {}

        if self.config.max_size_bytes > 0 {
            while inner.current_size + size > self.config.max_size_bytes && inner.evict_oldest() {}
        }

        inner.items.insert(key.clone(), artifact);
        inner.lru_queue.push_back(key.clone());
        inner.current_size += size;
        inner.stats.inserts += 1;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{
        cache_key::derive_key,
        thumbnail::{normalize, OutputEncoding, RawThumbnailParams},
    };

    fn key(n: u32) -> CacheKey {
        let params = RawThumbnailParams {
            key: Some(format!("videos/{}.mp4", n)),
            ..Default::default()
        };
        derive_key(&normalize(&params, OutputEncoding::Jpeg).unwrap())
    }

    fn jpeg(data: &'static [u8]) -> CachedArtifact {
        CachedArtifact::new(data, "image/jpeg")
    }

    #[tokio::test]
    async fn test_round_trip_is_byte_exact() {
        let cache = MemoryCacheStore::default();
        let artifact = CachedArtifact::new(vec![0xff, 0xd8, 0x00, 0xff, 0xd9], "image/avif");

        cache.put(&key(1), artifact.clone()).await.unwrap();
        let stored = cache.get(&key(1)).await.unwrap().unwrap();

        assert_eq!(stored, artifact);
    }

    #[tokio::test]
    async fn test_absent_key_is_none() {
        let cache = MemoryCacheStore::default();
        assert!(cache.get(&key(1)).await.unwrap().is_none());
        assert_eq!(cache.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = MemoryCacheStore::default();
        cache.put(&key(1), jpeg(b"first")).await.unwrap();
        cache.put(&key(1), jpeg(b"second!")).await.unwrap();

        let stored = cache.get(&key(1)).await.unwrap().unwrap();
        assert_eq!(&stored.bytes[..], b"second!");
        assert_eq!(cache.item_count().await, 1);
        assert_eq!(cache.current_size().await, 7);
    }

    #[tokio::test]
    async fn test_lru_eviction_by_count() {
        let cache = MemoryCacheStore::new(MemoryCacheConfig {
            max_items: 2,
            max_size_bytes: 0,
        });

        cache.put(&key(0), jpeg(b"data0")).await.unwrap();
        cache.put(&key(1), jpeg(b"data1")).await.unwrap();
        // key(0) becomes most recently used
        cache.get(&key(0)).await.unwrap();
        cache.put(&key(2), jpeg(b"data2")).await.unwrap();

        assert!(cache.get(&key(0)).await.unwrap().is_some());
        assert!(cache.get(&key(1)).await.unwrap().is_none());
        assert!(cache.get(&key(2)).await.unwrap().is_some());
        assert_eq!(cache.stats().await.evictions, 1);
    }

    #[tokio::test]
    async fn test_size_limit() {
        let cache = MemoryCacheStore::new(MemoryCacheConfig {
            max_items: 100,
            max_size_bytes: 20,
        });

        for i in 0..3 {
            cache
                .put(&key(i), CachedArtifact::new(vec![0u8; 10], "image/jpeg"))
                .await
                .unwrap();
        }

        assert_eq!(cache.item_count().await, 2);
        assert!(cache.current_size().await <= 20);
        assert!(cache.get(&key(0)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_artifact_not_stored() {
        let cache = MemoryCacheStore::new(MemoryCacheConfig {
            max_items: 10,
            max_size_bytes: 4,
        });
        cache.put(&key(0), jpeg(b"too large")).await.unwrap();
        assert_eq!(cache.item_count().await, 0);
    }
}
