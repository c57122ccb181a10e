//! Crab rave and Miku rave meme videos

pub mod captions;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::application::errors::CommandError;
use crate::application::messaging::parser::clean_content;
use crate::application::services::TemplateCache;
use crate::domain::entities::{
    Attachment, BucketType, Command, OutgoingMessage, RenderJob, TemplateAsset, TextLayer,
};
use crate::domain::traits::{VideoDownloader, VideoRenderer};
use crate::plugins::trait_def::{Cog, CommandContext};

pub use captions::{split_captions, GONE_SUFFIX};

pub const FONT_URL: &str = "https://github.com/matomo-org/travis-scripts/raw/master/fonts/Verdana.ttf";
pub const FONT_FILE: &str = "Verdana.ttf";
pub const UNDERLINE: &str = "____________________";

const TEMPLATE_FAILED: &str = "I couldn't download the template file.";
const FONT_FAILED: &str = "I couldn't download the font file.";

/// Template, timing and text look of one rave command
#[derive(Debug, Clone)]
pub struct RaveStyle {
    pub command: &'static str,
    pub title: &'static str,
    pub template: TemplateAsset,
    pub duration_secs: f32,
    pub colour: &'static str,
    pub stroke: Option<(u32, &'static str)>,
    pub volume: f32,
}

impl RaveStyle {
    pub fn crab() -> Self {
        Self {
            command: "crabrave",
            title: "Crabrave",
            template: TemplateAsset::video("crab_template.mp4", "https://youtu.be/gDLE3LikgUs"),
            duration_secs: 15.4,
            colour: "white",
            stroke: Some((2, "black")),
            volume: 0.1,
        }
    }

    pub fn miku() -> Self {
        Self {
            command: "mikurave",
            title: "Mikurave",
            template: TemplateAsset::video("miku_template.mp4", "https://youtu.be/qeJjQGF6gz4"),
            duration_secs: 40.0,
            // DarkSlateGrey
            colour: "0x2F4F4F",
            stroke: None,
            volume: 0.7,
        }
    }

    pub fn for_command(name: &str) -> Option<Self> {
        match name {
            "crabrave" => Some(Self::crab()),
            "mikurave" => Some(Self::miku()),
            _ => None,
        }
    }

    /// Name the finished video is uploaded as
    pub fn upload_name(&self) -> String {
        format!("{}.mp4", self.command)
    }

    /// Two caption lines with an underline between them
    pub fn job(&self, template: &Path, font: &Path, output: &Path, captions: &[String]) -> RenderJob {
        let first = captions.first().cloned().unwrap_or_default();
        let second = captions.get(1).cloned().unwrap_or_default();
        let stroke = self.stroke.map(|(width, colour)| (width, colour.to_string()));
        RenderJob {
            template: template.to_path_buf(),
            font: font.to_path_buf(),
            output: output.to_path_buf(),
            layers: vec![
                TextLayer { text: first, y: 200, stroke: stroke.clone() },
                TextLayer { text: UNDERLINE.to_string(), y: 210, stroke: None },
                TextLayer { text: second, y: 270, stroke },
            ],
            font_size: 48,
            colour: self.colour.to_string(),
            fade_in_secs: 1.0,
            duration_secs: self.duration_secs,
            volume: self.volume,
        }
    }
}

/// Makes meme videos from text
pub struct RaveCog {
    cache: Arc<TemplateCache>,
    downloader: Arc<dyn VideoDownloader>,
    renderer: Arc<dyn VideoRenderer>,
    font: TemplateAsset,
    render_timeout: Duration,
}

impl RaveCog {
    pub fn new(
        cache: Arc<TemplateCache>,
        downloader: Arc<dyn VideoDownloader>,
        renderer: Arc<dyn VideoRenderer>,
    ) -> Self {
        Self {
            cache,
            downloader,
            renderer,
            font: TemplateAsset::http(FONT_FILE, FONT_URL),
            render_timeout: Duration::from_secs(300),
        }
    }

    pub fn with_font_url(mut self, url: impl Into<String>) -> Self {
        self.font = TemplateAsset::http(FONT_FILE, url);
        self
    }

    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    async fn rave(&self, ctx: &CommandContext, style: &RaveStyle, text: &str) -> Result<(), CommandError> {
        ctx.typing().await;

        let template = match self.cache.ensure(&style.template).await {
            Ok(path) => path,
            Err(e) => {
                tracing::error!("Error downloading {}: {}", style.template.name, e);
                ctx.say(TEMPLATE_FAILED).await?;
                return Ok(());
            }
        };
        let font = match self.cache.ensure(&self.font).await {
            Ok(path) => path,
            Err(e) => {
                tracing::error!("Error downloading {}: {}", self.font.name, e);
                ctx.say(FONT_FAILED).await?;
                return Ok(());
            }
        };

        let captions = split_captions(&clean_content(text, &ctx.message.mentions).to_uppercase());
        if captions.is_empty() {
            self.upload(ctx, style, &template).await;
            return Ok(());
        }

        let output = self
            .cache
            .dir()
            .join(format!("{}{}.mp4", ctx.message.id, style.command));
        let job = style.job(&template, &font, &output, &captions);

        match tokio::time::timeout(self.render_timeout, self.renderer.render(&job)).await {
            Ok(Ok(())) => {
                self.upload(ctx, style, &output).await;
            }
            Ok(Err(e)) => {
                tracing::error!("Error rendering {}: {}", style.command, e);
                ctx.say(format!("I couldn't generate the {} video.", style.title)).await?;
            }
            Err(_) => {
                tracing::warn!("{} render timed out after {:?}", style.command, self.render_timeout);
                ctx.say(format!("{} Video took too long to generate.", style.title)).await?;
            }
        }
        remove_output(&output).await;
        Ok(())
    }

    async fn upload(&self, ctx: &CommandContext, style: &RaveStyle, path: &Path) {
        let message = OutgoingMessage::file(Attachment::new(path, style.upload_name()));
        if let Err(e) = ctx.send(message).await {
            tracing::error!("Error uploading {}: {}", style.upload_name(), e);
        }
    }
}

/// Remove a rendered video; a missing file is fine
async fn remove_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::error!("Error deleting {}: {}", path.display(), e),
    }
}

#[async_trait]
impl Cog for RaveCog {
    fn name(&self) -> &str {
        "CrabRave"
    }

    fn description(&self) -> &str {
        "Create your very own crab rave"
    }

    fn version(&self) -> &str {
        "1.1.3"
    }

    fn commands(&self) -> Vec<Command> {
        let rave = |name: &str, what: &str| {
            Command::new(name)
                .with_description(format!("Make a {} video. Separate the two lines with a comma.", what))
                .with_usage(format!("{} <text...>", name))
                .with_cooldown(1, 20, BucketType::Guild)
                .with_max_concurrency(2, BucketType::Default)
        };
        vec![rave("crabrave", "crab rave"), rave("mikurave", "Miku rave")]
    }

    async fn invoke(&self, mut ctx: CommandContext) -> Result<(), CommandError> {
        let style = RaveStyle::for_command(&ctx.command.qualified_name)
            .ok_or_else(|| CommandError::NotFound(ctx.command.qualified_name.clone()))?;
        let text = ctx.args.rest().ok_or_else(|| ctx.missing_argument("text"))?;
        self.rave(&ctx, &style, &text).await
    }

    async fn metadata(&self) -> BTreeMap<String, String> {
        let mut meta = BTreeMap::new();
        let unknown = || "unknown".to_string();
        meta.insert("yt-dlp Version".to_string(), self.downloader.version().await.unwrap_or_else(unknown));
        meta.insert("ffmpeg Version".to_string(), self.renderer.version().await.unwrap_or_else(unknown));
        meta
    }
}
