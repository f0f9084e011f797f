pub mod local;
pub mod s3;

use async_trait::async_trait;

use crate::error::ResolveError;

pub use local::LocalSourceResolver;
pub use s3::S3SourceResolver;

/// Maps a video key to a URL the decoder can read.
///
/// The URL may expire; callers use it for one generation and never store it.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve_read_url(&self, video_key: &str) -> Result<String, ResolveError>;
}
