//! Plain HTTP downloads

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::application::errors::MediaError;
use crate::domain::traits::FileFetcher;

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl FileFetcher for HttpFetcher {
    /// Stream `url` into `destination`; nothing is left behind on failure
    async fn fetch(&self, url: &str, destination: &Path) -> Result<(), MediaError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::Download(e.to_string()))?;
        if !response.status().is_success() {
            return Err(MediaError::Download(format!("{} returned {}", url, response.status())));
        }

        let partial = destination.with_extension("part");
        save_or_discard(response.bytes_stream(), &partial, destination).await
    }
}

/// Save `body` through `partial`; the partial file is removed on any failure
async fn save_or_discard<S, B, E>(body: S, partial: &Path, destination: &Path) -> Result<(), MediaError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let result = save_stream(body, partial, destination).await;
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(partial).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Could not remove {}: {}", partial.display(), e);
            }
        }
    }
    result
}

async fn save_stream<S, B, E>(body: S, partial: &Path, destination: &Path) -> Result<(), MediaError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    futures_util::pin_mut!(body);
    let mut file = tokio::fs::File::create(partial).await?;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| MediaError::Download(e.to_string()))?;
        file.write_all(chunk.as_ref()).await?;
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(partial, destination).await?;
    Ok(())
}
