//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use crate::application::errors::ConfigError;

/// Bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub bot: BotConfig,
    pub storage: StorageConfig,
    pub adapters: AdaptersConfig,
    pub rave: RaveConfig,
    pub twitter: TwitterConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotConfig {
    pub name: String,
    pub prefix: String,
    pub owners: Vec<String>,
    pub admins: Vec<String>,
    pub moderators: Vec<String>,
    /// Colour used for embeds, as `0xRRGGBB`
    pub embed_colour: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    Json,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AdaptersConfig {
    pub discord: Option<DiscordConfig>,
    pub console: Option<ConsoleConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DiscordConfig {
    pub enabled: bool,
    pub token: Option<String>,
    pub api_base: String,
    pub poll_interval_ms: u64,
    /// Channels polled for commands
    pub channels: Vec<WatchedChannel>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct WatchedChannel {
    pub id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// User id the console speaks as
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RaveConfig {
    pub enabled: bool,
    pub data_dir: PathBuf,
    pub ffmpeg_path: String,
    pub ytdl_path: String,
    pub font_url: String,
    pub download_timeout_secs: u64,
    pub render_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TwitterConfig {
    pub enabled: bool,
    pub api_base: String,
    pub bearer_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub api_timeout_secs: u64,
    pub stream: bool,
    pub reconnect_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig::default(),
            storage: StorageConfig::default(),
            adapters: AdaptersConfig {
                discord: Some(DiscordConfig::default()),
                console: Some(ConsoleConfig::default()),
            },
            rave: RaveConfig::default(),
            twitter: TwitterConfig::default(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "cogbot".to_string(),
            prefix: "!".to_string(),
            owners: Vec::new(),
            admins: Vec::new(),
            moderators: Vec::new(),
            embed_colour: 0x1DA1F2,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Json,
            path: PathBuf::from("data/config.json"),
        }
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token: None,
            api_base: "https://discord.com/api/v10".to_string(),
            poll_interval_ms: 2000,
            channels: Vec::new(),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            user_id: "console".to_string(),
        }
    }
}

impl Default for RaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            data_dir: PathBuf::from("data/CrabRave"),
            ffmpeg_path: "ffmpeg".to_string(),
            ytdl_path: "yt-dlp".to_string(),
            font_url: "https://github.com/matomo-org/travis-scripts/raw/master/fonts/Verdana.ttf".to_string(),
            download_timeout_secs: 60,
            render_timeout_secs: 300,
        }
    }
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: "https://api.twitter.com".to_string(),
            bearer_token: None,
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            api_timeout_secs: 10,
            stream: true,
            reconnect_secs: 60,
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue("bot.prefix must not be empty".to_string()));
        }
        if let Some(discord) = self.adapters.discord.as_ref().filter(|d| d.enabled) {
            if discord.token.as_deref().unwrap_or("").is_empty() {
                return Err(ConfigError::MissingField("adapters.discord.token".to_string()));
            }
        }
        Ok(())
    }

    pub fn load_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    /// Override settings from environment variables
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("DISCORD_TOKEN") {
            let discord = self.adapters.discord.get_or_insert_with(DiscordConfig::default);
            discord.token = Some(token);
            discord.enabled = true;
        }

        if let Ok(prefix) = std::env::var("BOT_PREFIX") {
            self.bot.prefix = prefix;
        }

        if let Ok(owner) = std::env::var("BOT_OWNER_ID") {
            if !self.bot.owners.contains(&owner) {
                self.bot.owners.push(owner);
            }
        }

        if let Ok(token) = std::env::var("TWITTER_BEARER_TOKEN") {
            self.twitter.bearer_token = Some(token);
        }
    }

    pub fn discord_enabled(&self) -> bool {
        self.adapters.discord.as_ref().is_some_and(|d| d.enabled)
    }

    pub fn console_enabled(&self) -> bool {
        self.adapters.console.as_ref().is_some_and(|c| c.enabled)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_cog_constants() {
        let config = Config::default();
        assert_eq!(config.bot.prefix, "!");
        assert_eq!(config.rave.download_timeout_secs, 60);
        assert_eq!(config.rave.render_timeout_secs, 300);
        assert_eq!(config.twitter.api_timeout_secs, 10);
        assert!(config.console_enabled());
        assert!(!config.discord_enabled());
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let yaml = r#"
bot:
  prefix: "?"
  owners: ["1"]
storage:
  backend: sqlite
  path: data/bot.db
adapters:
  discord:
    enabled: true
    token: abc
    channels:
      - id: "10"
        guild-id: "20"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.bot.prefix, "?");
        assert_eq!(config.bot.name, "cogbot");
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        let discord = config.adapters.discord.as_ref().unwrap();
        assert_eq!(discord.poll_interval_ms, 2000);
        assert_eq!(discord.channels[0].guild_id.as_deref(), Some("20"));
        assert!(config.adapters.console.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn yaml_round_trip_and_validation() {
        let config = Config::default();
        let yaml = config.to_yaml().unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.rave.font_url, config.rave.font_url);

        let mut broken = Config::default();
        broken.adapters.discord = Some(DiscordConfig { enabled: true, ..Default::default() });
        assert!(matches!(broken.validate(), Err(ConfigError::MissingField(_))));
    }
}
