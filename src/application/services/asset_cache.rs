//! Lazily fetched template files kept in a cog's data dir

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::application::errors::MediaError;
use crate::domain::entities::{AssetSource, TemplateAsset};
use crate::domain::traits::{FileFetcher, VideoDownloader};

pub struct TemplateCache {
    dir: PathBuf,
    downloader: Arc<dyn VideoDownloader>,
    fetcher: Arc<dyn FileFetcher>,
    download_timeout: Duration,
    fetch_lock: Mutex<()>,
}

impl TemplateCache {
    pub fn new(
        dir: impl Into<PathBuf>,
        downloader: Arc<dyn VideoDownloader>,
        fetcher: Arc<dyn FileFetcher>,
        download_timeout: Duration,
    ) -> Self {
        Self {
            dir: dir.into(),
            downloader,
            fetcher,
            download_timeout,
            fetch_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, asset: &TemplateAsset) -> PathBuf {
        self.dir.join(&asset.name)
    }

    /// Make sure `asset` exists locally, fetching it on first use
    pub async fn ensure(&self, asset: &TemplateAsset) -> Result<PathBuf, MediaError> {
        let path = self.path_of(asset);
        if path.is_file() {
            return Ok(path);
        }

        let _guard = self.fetch_lock.lock().await;
        // Another invocation may have finished the fetch while we waited
        if path.is_file() {
            return Ok(path);
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        tracing::info!("Fetching template {} into {}", asset.name, self.dir.display());

        let fetch = async {
            match &asset.source {
                AssetSource::Video(link) => self.downloader.download(link, &path).await,
                AssetSource::Http(url) => self.fetcher.fetch(url, &path).await,
            }
        };
        match tokio::time::timeout(self.download_timeout, fetch).await {
            Ok(Ok(())) if path.is_file() => Ok(path),
            Ok(Ok(())) => Err(MediaError::Download(format!("{} was not written", asset.name))),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(MediaError::Timeout(self.download_timeout)),
        }
    }
}
