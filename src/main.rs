use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

use cogbot::application::errors::{BotError, StorageError};
use cogbot::application::messaging::{CooldownMiddleware, Dispatcher, LoggingMiddleware, RoleMiddleware};
use cogbot::application::services::{ApiTokens, CommandService, RoleResolver, ServiceTokens, TemplateCache};
use cogbot::domain::traits::{Bot, Store};
use cogbot::infrastructure::adapters::{ConsoleAdapter, DiscordAdapter};
use cogbot::infrastructure::config::{Config, StorageBackend};
use cogbot::infrastructure::database::SqliteStore;
use cogbot::infrastructure::media::{FfmpegRenderer, HttpFetcher, YtDlpDownloader};
use cogbot::infrastructure::storage::JsonStore;
use cogbot::infrastructure::twitter::TwitterClient;
use cogbot::plugins::{CogManager, CoreCog, RaveCog, TweetsCog, TweetsSettings};

#[derive(Parser)]
#[command(name = "cogbot")]
#[command(about = "Chat bot cogs: meme videos and a Twitter relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Discord bot token (overrides config)
    #[arg(short, long)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            if let Err(e) = run_bot(&cli.config, cli.token) {
                tracing::error!("Bot stopped: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("cogbot v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => {
            init_config();
        }
    }
}

fn load_config(config_path: &str, token_override: Option<String>) -> Config {
    let mut config = if std::path::Path::new(config_path).exists() {
        Config::load(config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using defaults", e);
            Config::load_env()
        })
    } else {
        Config::load_env()
    };
    config.apply_env();

    if let Some(token) = token_override {
        let discord = config.adapters.discord.get_or_insert_with(Default::default);
        discord.token = Some(token);
        discord.enabled = true;
    }
    config
}

fn run_bot(config_path: &str, token_override: Option<String>) -> Result<(), BotError> {
    let config = load_config(config_path, token_override);
    tracing::info!("Starting cogbot: {}", config.bot.name);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(serve(config))
}

async fn open_store(config: &Config) -> Result<Arc<dyn Store>, BotError> {
    let path = &config.storage.path;
    let store: Arc<dyn Store> = match config.storage.backend {
        StorageBackend::Json => Arc::new(JsonStore::open(path.clone()).await?),
        StorageBackend::Sqlite => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            Arc::new(SqliteStore::new(path).map_err(StorageError::from)?)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, settings are lost on exit");
            Arc::new(JsonStore::in_memory())
        }
    };
    tracing::info!("Storage initialized ({:?})", config.storage.backend);
    Ok(store)
}

/// Copy Twitter secrets from the config file into shared tokens without overwriting owner edits
async fn seed_twitter_tokens(config: &Config, store: Arc<dyn Store>) -> Result<(), BotError> {
    let twitter = &config.twitter;
    let mut seed = ServiceTokens::new();
    for (key, value) in [
        ("bearer_token", &twitter.bearer_token),
        ("client_id", &twitter.client_id),
        ("client_secret", &twitter.client_secret),
        ("redirect_uri", &twitter.redirect_uri),
    ] {
        if let Some(value) = value {
            seed.insert(key.to_string(), value.clone());
        }
    }
    ApiTokens::from_store(store).seed("twitter", &seed).await?;
    Ok(())
}

async fn load_cogs(config: &Config, store: Arc<dyn Store>, bot: Arc<dyn Bot>) -> Result<Arc<CogManager>, BotError> {
    let mut commands = CommandService::new(&config.bot.prefix);
    commands.register_defaults();
    let cogs = Arc::new(CogManager::new(commands.shared()));

    cogs.load(Arc::new(CoreCog::new(store.clone()))).await?;

    if config.rave.enabled {
        let rave = &config.rave;
        tokio::fs::create_dir_all(&rave.data_dir).await?;
        let downloader = Arc::new(YtDlpDownloader::new(&rave.ytdl_path));
        let cache = Arc::new(TemplateCache::new(
            &rave.data_dir,
            downloader.clone(),
            Arc::new(HttpFetcher::default()),
            Duration::from_secs(rave.download_timeout_secs),
        ));
        let cog = RaveCog::new(cache, downloader, Arc::new(FfmpegRenderer::new(&rave.ffmpeg_path)))
            .with_font_url(&rave.font_url)
            .with_render_timeout(Duration::from_secs(rave.render_timeout_secs));
        cogs.load(Arc::new(cog)).await?;
    }

    if config.twitter.enabled {
        let twitter = &config.twitter;
        let api_timeout = Duration::from_secs(twitter.api_timeout_secs);
        let settings = TweetsSettings {
            stream: twitter.stream,
            reconnect: Duration::from_secs(twitter.reconnect_secs),
            api_timeout,
            colour: config.bot.embed_colour,
        };
        let api = Arc::new(TwitterClient::new(&twitter.api_base, api_timeout));
        cogs.load(Arc::new(TweetsCog::new(api, store, bot, settings))).await?;
    }

    tracing::info!("Loaded cogs: {}", cogs.names().join(", "));
    Ok(cogs)
}

fn build_dispatcher(config: &Config, cogs: Arc<CogManager>, bot: Arc<dyn Bot>) -> Arc<Dispatcher> {
    let roles = RoleResolver::new(&config.bot.owners, &config.bot.admins, &config.bot.moderators);
    let dispatcher = Dispatcher::new(cogs, roles, bot)
        .with_middleware(LoggingMiddleware)
        .with_middleware(RoleMiddleware)
        .with_middleware(CooldownMiddleware::new());
    Arc::new(dispatcher)
}

async fn serve(config: Config) -> Result<(), BotError> {
    let store = open_store(&config).await?;
    seed_twitter_tokens(&config, store.clone()).await?;

    let discord = config.adapters.discord.clone().filter(|d| d.enabled);
    let (cogs, result) = if let Some(discord) = discord {
        let token = discord.token.clone().unwrap_or_default();
        let mut adapter = DiscordAdapter::new(token, discord.channels.clone())
            .with_api_base(&discord.api_base)
            .with_poll_interval(Duration::from_millis(discord.poll_interval_ms));
        adapter.fetch_bot_info().await?;
        tracing::info!("Bot started: @{}", adapter.bot_info().username);

        let adapter = Arc::new(adapter);
        let bot: Arc<dyn Bot> = adapter.clone();
        let cogs = load_cogs(&config, store, bot.clone()).await?;
        let dispatcher = build_dispatcher(&config, cogs.clone(), bot);
        let result = tokio::select! {
            result = adapter.poll_loop(dispatcher) => result,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                Ok(())
            }
        };
        (cogs, result)
    } else {
        if !config.console_enabled() {
            tracing::warn!("No adapter enabled, falling back to the console");
        }
        let user_id = config
            .adapters
            .console
            .as_ref()
            .map(|c| c.user_id.clone())
            .unwrap_or_else(|| "console".to_string());
        let bot: Arc<dyn Bot> = Arc::new(ConsoleAdapter::new());
        let cogs = load_cogs(&config, store, bot.clone()).await?;
        let dispatcher = build_dispatcher(&config, cogs.clone(), bot);
        let result = tokio::select! {
            result = ConsoleAdapter::run(dispatcher, &user_id) => result,
            _ = tokio::signal::ctrl_c() => Ok(()),
        };
        (cogs, result)
    };

    cogs.unload_all().await;
    result
}

fn init_config() {
    match Config::default().to_yaml() {
        Ok(yaml) => {
            println!("{}", yaml);
            println!("\nSave this to config.yaml and adjust as needed.");
        }
        Err(e) => tracing::error!("Failed to render default config: {}", e),
    }
}
