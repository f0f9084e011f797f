//! Cache key derivation for generated thumbnails
//!
//! Every field that changes the rendered pixels is hashed as a
//! length-prefixed tuple, so no character inside `video_key` (slashes,
//! dashes, anything) can make two different requests share a key.
//!
//! The time parameter enters the key as the caller spelled it. `60s` and
//! `1m` describe the same frame but are cached as separate objects; this
//! matches the long-standing URL contract and is intentional.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::thumbnail::{OutputEncoding, ThumbnailRequest};

/// Bumped whenever the hashed tuple changes shape
const KEY_SCHEME: &[u8] = b"thumbnail-key/v1";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Encoding implied by the key's extension
    pub fn encoding(&self) -> Option<OutputEncoding> {
        self.0
            .rsplit_once('.')
            .and_then(|(_, ext)| OutputEncoding::from_extension(ext))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the cache key for a validated request
pub fn derive_key(request: &ThumbnailRequest) -> CacheKey {
    let width = request.width().to_string();
    let height = request.height().to_string();
    let fields: [&str; 6] = [
        request.video_key(),
        request.time_expression(),
        &width,
        &height,
        request.fit().as_str(),
        request.encoding().as_str(),
    ];

    let mut hasher = Sha256::new();
    hasher.update(KEY_SCHEME);
    for field in fields {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    let digest = hasher.finalize();

    CacheKey(format!(
        "{}.{}",
        hex::encode(digest),
        request.encoding().extension()
    ))
}
