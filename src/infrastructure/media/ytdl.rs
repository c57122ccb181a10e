//! Template downloads through yt-dlp

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;

use super::{check_output, tool_version};
use crate::application::errors::MediaError;
use crate::domain::traits::VideoDownloader;

const FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]";

pub struct YtDlpDownloader {
    program: String,
}

impl YtDlpDownloader {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    fn args(link: &str, destination: &Path) -> Vec<String> {
        vec![
            "--no-playlist".to_string(),
            "--quiet".to_string(),
            "-f".to_string(),
            FORMAT.to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "-o".to_string(),
            destination.to_string_lossy().into_owned(),
            "--".to_string(),
            link.to_string(),
        ]
    }
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl VideoDownloader for YtDlpDownloader {
    async fn download(&self, link: &str, destination: &Path) -> Result<(), MediaError> {
        tracing::debug!("Downloading {} to {}", link, destination.display());
        let output = tokio::process::Command::new(&self.program)
            .args(Self::args(link, destination))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MediaError::Spawn {
                tool: self.program.clone(),
                reason: e.to_string(),
            })?;
        check_output(&self.program, output)?;
        Ok(())
    }

    async fn version(&self) -> Option<String> {
        tool_version(&self.program, "--version").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_comes_after_the_separator() {
        let args = YtDlpDownloader::args("-not-a-flag", Path::new("/data/crab_template.mp4"));
        let sep = args.iter().position(|a| a == "--").unwrap();
        assert_eq!(args[sep + 1], "-not-a-flag");
        let out = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[out + 1], "/data/crab_template.mp4");
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let downloader = YtDlpDownloader::new("definitely-not-yt-dlp-on-path");
        let dir = tempfile::tempdir().unwrap();
        let err = downloader
            .download("https://youtu.be/x", &dir.path().join("x.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Spawn { .. }));
        assert_eq!(downloader.version().await, None);
    }
}
