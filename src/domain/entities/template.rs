use std::path::PathBuf;

/// Where a cached asset is fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    /// A page handled by the video downloader
    Video(String),
    /// A plain file over HTTP
    Http(String),
}

/// A file cached under a fixed name in the cog data dir
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateAsset {
    pub name: String,
    pub source: AssetSource,
}

impl TemplateAsset {
    pub fn video(name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: AssetSource::Video(link.into()),
        }
    }

    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: AssetSource::Http(url.into()),
        }
    }
}

/// One line of text drawn over the video
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayer {
    pub text: String,
    pub y: u32,
    /// Outline width and colour
    pub stroke: Option<(u32, String)>,
}

/// Everything the renderer needs for one video
#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    pub template: PathBuf,
    pub font: PathBuf,
    pub output: PathBuf,
    pub layers: Vec<TextLayer>,
    pub font_size: u32,
    pub colour: String,
    pub fade_in_secs: f32,
    pub duration_secs: f32,
    pub volume: f32,
}
