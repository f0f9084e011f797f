pub mod memory;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use common::cache_key::CacheKey;

use crate::error::CacheError;

pub use memory::{MemoryCacheConfig, MemoryCacheStore};
pub use s3::S3CacheStore;

/// A stored thumbnail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    pub bytes: Bytes,
    pub content_type: String,
}

impl CachedArtifact {
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Storage for generated thumbnails.
///
/// `get` returns `Ok(None)` only when the key is absent; every other failure
/// is an `Err`. `put` overwrites.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedArtifact>, CacheError>;

    async fn put(&self, key: &CacheKey, artifact: CachedArtifact) -> Result<(), CacheError>;
}
