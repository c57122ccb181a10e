//! External media tools

pub mod ffmpeg;
pub mod http;
pub mod ytdl;

pub use ffmpeg::FfmpegRenderer;
pub use http::HttpFetcher;
pub use ytdl::YtDlpDownloader;

use std::process::Output;

use crate::application::errors::MediaError;

/// Turn a finished process into an error when it exited unsuccessfully
pub(crate) fn check_output(tool: &str, output: Output) -> Result<Output, MediaError> {
    if output.status.success() {
        return Ok(output);
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
    Err(MediaError::Failed {
        tool: tool.to_string(),
        status: output.status.to_string(),
        stderr: tail.into_iter().rev().collect::<Vec<_>>().join("\n"),
    })
}

/// First line of `<tool> --version`
pub(crate) async fn tool_version(program: &str, flag: &str) -> Option<String> {
    let output = tokio::process::Command::new(program)
        .arg(flag)
        .kill_on_drop(true)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
}
