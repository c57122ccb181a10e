//! Text overlays burned in with ffmpeg

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use super::{check_output, tool_version};
use crate::application::errors::MediaError;
use crate::domain::entities::RenderJob;
use crate::domain::traits::VideoRenderer;

pub struct FfmpegRenderer {
    program: String,
}

/// Caption files written next to the font; removed when dropped, including when the
/// render future is cancelled by a timeout
struct CaptionFiles {
    paths: Vec<PathBuf>,
}

impl Drop for CaptionFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::debug!("Could not remove {}: {}", path.display(), e);
            }
        }
    }
}

impl FfmpegRenderer {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    /// Names of the caption files for `job`, relative to the font directory
    fn caption_names(job: &RenderJob) -> Vec<String> {
        let stem = job
            .output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "render".to_string());
        (0..job.layers.len()).map(|i| format!("{}.{}.txt", stem, i)).collect()
    }

    /// Video filtergraph; file names are resolved against the font directory
    pub(crate) fn filter_graph(job: &RenderJob, caption_names: &[String]) -> String {
        let font = job
            .font
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut filters = Vec::with_capacity(job.layers.len());
        for (layer, textfile) in job.layers.iter().zip(caption_names) {
            let mut f = format!(
                "drawtext=fontfile='{}':textfile='{}':fontsize={}:fontcolor={}:x=(w-text_w)/2:y={}",
                escape(&font),
                escape(textfile),
                job.font_size,
                job.colour,
                layer.y
            );
            if let Some((width, colour)) = &layer.stroke {
                f.push_str(&format!(":borderw={}:bordercolor={}", width, colour));
            }
            if job.fade_in_secs > 0.0 {
                f.push_str(&format!(":alpha='min(t/{},1)'", job.fade_in_secs));
            }
            filters.push(f);
        }

        if filters.is_empty() {
            "[0:v]null[v]".to_string()
        } else {
            format!("[0:v]{}[v]", filters.join(","))
        }
    }

    pub(crate) fn args(job: &RenderJob, caption_names: &[String]) -> Vec<String> {
        let path = |p: &Path| p.to_string_lossy().into_owned();
        let mut args: Vec<String> = vec!["-y", "-hide_banner", "-loglevel", "error", "-i"]
            .into_iter()
            .map(String::from)
            .collect();
        args.push(path(&job.template));
        args.extend([
            "-t".to_string(),
            format!("{}", job.duration_secs),
            "-filter_complex".to_string(),
            Self::filter_graph(job, caption_names),
            "-map".to_string(),
            "[v]".to_string(),
            "-map".to_string(),
            "0:a?".to_string(),
            "-af".to_string(),
            format!("volume={}", job.volume),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "superfast".to_string(),
            "-threads".to_string(),
            "1".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
        ]);
        args.push(path(&job.output));
        args
    }
}

impl Default for FfmpegRenderer {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

/// Escape a value for use inside single quotes in a filter option
fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "'\\''")
}

#[async_trait]
impl VideoRenderer for FfmpegRenderer {
    async fn render(&self, job: &RenderJob) -> Result<(), MediaError> {
        let workdir = job
            .font
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let names = Self::caption_names(job);

        let mut captions = CaptionFiles { paths: Vec::new() };
        for (layer, name) in job.layers.iter().zip(&names) {
            let path = workdir.join(name);
            tokio::fs::write(&path, &layer.text).await?;
            captions.paths.push(path);
        }

        tracing::debug!("Rendering {} with {} text layers", job.output.display(), job.layers.len());
        let output = tokio::process::Command::new(&self.program)
            .args(Self::args(job, &names))
            .current_dir(&workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MediaError::Spawn {
                tool: self.program.clone(),
                reason: e.to_string(),
            })?;
        drop(captions);

        check_output(&self.program, output)?;
        Ok(())
    }

    async fn version(&self) -> Option<String> {
        tool_version(&self.program, "-version").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::TextLayer;

    fn job(stroke: Option<(u32, String)>) -> RenderJob {
        let layer = |text: &str, y: u32, stroke: Option<(u32, String)>| TextLayer { text: text.into(), y, stroke };
        RenderJob {
            template: PathBuf::from("/data/crab_template.mp4"),
            font: PathBuf::from("/data/Verdana.ttf"),
            output: PathBuf::from("/data/42crabrave.mp4"),
            layers: vec![
                layer("RUST", 200, stroke.clone()),
                layer("____________________", 210, None),
                layer("IS GONE", 270, stroke),
            ],
            font_size: 48,
            colour: "white".into(),
            fade_in_secs: 1.0,
            duration_secs: 15.4,
            volume: 0.1,
        }
    }

    #[test]
    fn graph_has_one_drawtext_per_layer() {
        let job = job(Some((2, "black".into())));
        let names = FfmpegRenderer::caption_names(&job);
        assert_eq!(names, vec!["42crabrave.0.txt", "42crabrave.1.txt", "42crabrave.2.txt"]);

        let graph = FfmpegRenderer::filter_graph(&job, &names);
        assert!(graph.starts_with("[0:v]drawtext=fontfile='Verdana.ttf':textfile='42crabrave.0.txt'"));
        assert!(graph.ends_with("[v]"));
        assert_eq!(graph.matches("drawtext=").count(), 3);
        assert_eq!(graph.matches(":borderw=2:bordercolor=black").count(), 2);
        let underline = graph.split("drawtext=").find(|f| f.contains(":y=210")).unwrap();
        assert!(!underline.contains("borderw"));
        assert!(graph.contains(":y=270"));
        assert!(graph.contains(":alpha='min(t/1,1)'"));
    }

    #[test]
    fn args_carry_duration_volume_and_preset() {
        let job = job(None);
        let names = FfmpegRenderer::caption_names(&job);
        let args = FfmpegRenderer::args(&job, &names);
        let after = |flag: &str| {
            let i = args.iter().position(|a| a == flag).unwrap();
            args[i + 1].clone()
        };
        assert_eq!(after("-i"), "/data/crab_template.mp4");
        assert_eq!(after("-t"), "15.4");
        assert_eq!(after("-af"), "volume=0.1");
        assert_eq!(after("-preset"), "superfast");
        assert_eq!(after("-threads"), "1");
        assert_eq!(args.last().map(String::as_str), Some("/data/42crabrave.mp4"));
        assert!(!FfmpegRenderer::filter_graph(&job, &names).contains("borderw"));
    }

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(escape("it's"), "it'\\''s");
    }

    #[tokio::test]
    async fn failed_spawn_cleans_caption_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job(None);
        job.font = dir.path().join("Verdana.ttf");
        job.output = dir.path().join("7crabrave.mp4");

        let renderer = FfmpegRenderer::new("definitely-not-ffmpeg-on-path");
        let err = renderer.render(&job).await.unwrap_err();
        assert!(matches!(err, MediaError::Spawn { .. }));
        assert!(!dir.path().join("7crabrave.0.txt").exists());
    }
}
