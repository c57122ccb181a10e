use async_trait::async_trait;
use std::path::Path;

use crate::application::errors::MediaError;
use crate::domain::entities::RenderJob;

/// Downloads a video page to a local file
#[async_trait]
pub trait VideoDownloader: Send + Sync {
    async fn download(&self, link: &str, destination: &Path) -> Result<(), MediaError>;

    /// Tool version for cog help
    async fn version(&self) -> Option<String> {
        None
    }
}

/// Fetches a plain file over HTTP
#[async_trait]
pub trait FileFetcher: Send + Sync {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<(), MediaError>;
}

/// Composites text layers onto a template video
#[async_trait]
pub trait VideoRenderer: Send + Sync {
    async fn render(&self, job: &RenderJob) -> Result<(), MediaError>;

    async fn version(&self) -> Option<String> {
        None
    }
}
