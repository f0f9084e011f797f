use async_trait::async_trait;
use aws_sdk_s3::{
    config::http::HttpResponse,
    error::{DisplayErrorContext, SdkError},
    operation::get_object::GetObjectError,
    primitives::ByteStream,
    Client,
};
use common::cache_key::CacheKey;
use tracing::debug;

use super::{CacheStore, CachedArtifact};
use crate::error::CacheError;
use crate::publisher::CACHE_CONTROL_IMMUTABLE;

/// Thumbnails stored as objects in a dedicated bucket
#[derive(Clone)]
pub struct S3CacheStore {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3CacheStore {
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_key(&self, key: &CacheKey) -> String {
        object_key(&self.prefix, key)
    }
}

fn object_key(prefix: &str, key: &CacheKey) -> String {
    format!("{}{}", prefix, key)
}

fn is_not_found(err: &SdkError<GetObjectError, HttpResponse>) -> bool {
    match err {
        SdkError::ServiceError(se) => se.err().is_no_such_key() || se.raw().status().as_u16() == 404,
        _ => false,
    }
}

/// Stored content type, or the one implied by the key when it is missing
fn resolve_content_type(stored: Option<&str>, key: &CacheKey) -> String {
    stored
        .filter(|ct| !ct.is_empty())
        .map(str::to_string)
        .or_else(|| key.encoding().map(|e| e.content_type().to_string()))
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

#[async_trait]
impl CacheStore for S3CacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedArtifact>, CacheError> {
        let object_key = self.object_key(key);
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) if is_not_found(&err) => return Ok(None),
            Err(err) => {
                return Err(CacheError::Backend(
                    DisplayErrorContext(&err).to_string(),
                ))
            }
        };

        let content_type = resolve_content_type(output.content_type(), key);
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| CacheError::Backend(format!("reading {}: {}", object_key, e)))?
            .into_bytes();

        debug!(bucket = %self.bucket, object = %object_key, size = bytes.len(), "cache object read");
        Ok(Some(CachedArtifact {
            bytes,
            content_type,
        }))
    }

    async fn put(&self, key: &CacheKey, artifact: CachedArtifact) -> Result<(), CacheError> {
        let object_key = self.object_key(key);
        let size = artifact.size();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .content_type(artifact.content_type)
            .cache_control(CACHE_CONTROL_IMMUTABLE)
            .body(ByteStream::from(artifact.bytes))
            .send()
            .await
            .map_err(|err| CacheError::Backend(DisplayErrorContext(&err).to_string()))?;

        debug!(bucket = %self.bucket, object = %object_key, size, "cache object written");
        Ok(())
    }
}
