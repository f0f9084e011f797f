use async_trait::async_trait;
use aws_sdk_s3::{error::DisplayErrorContext, presigning::PresigningConfig, Client};
use std::time::Duration;
use tracing::debug;

use super::SourceResolver;
use crate::error::ResolveError;

/// Presigned GET URLs for objects in the video bucket
#[derive(Clone)]
pub struct S3SourceResolver {
    client: Client,
    bucket: String,
    ttl: Duration,
}

impl S3SourceResolver {
    pub fn new(client: Client, bucket: impl Into<String>, ttl: Duration) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            ttl,
        }
    }
}

#[async_trait]
impl SourceResolver for S3SourceResolver {
    async fn resolve_read_url(&self, video_key: &str) -> Result<String, ResolveError> {
        let presigning = PresigningConfig::expires_in(self.ttl)
            .map_err(|e| ResolveError::Signing(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(video_key)
            .presigned(presigning)
            .await
            .map_err(|e| ResolveError::Signing(DisplayErrorContext(&e).to_string()))?;

        debug!(bucket = %self.bucket, key = %video_key, ttl_secs = self.ttl.as_secs(), "presigned source url");
        Ok(request.uri().to_string())
    }
}
