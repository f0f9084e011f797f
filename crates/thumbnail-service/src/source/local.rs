use async_trait::async_trait;
use common::validation::resolve_under_root;
use std::path::PathBuf;

use super::SourceResolver;
use crate::error::ResolveError;

/// Serves videos from a directory, for development without object storage
#[derive(Debug, Clone)]
pub struct LocalSourceResolver {
    root: PathBuf,
}

impl LocalSourceResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SourceResolver for LocalSourceResolver {
    async fn resolve_read_url(&self, video_key: &str) -> Result<String, ResolveError> {
        let path = resolve_under_root(video_key, &self.root, "key")
            .map_err(|e| ResolveError::InvalidKey(e.to_string()))?;

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path.display().to_string()),
            _ => Err(ResolveError::NotFound(video_key.to_string())),
        }
    }
}
