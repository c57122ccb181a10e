//! Cogs wired behind the dispatcher, the way the binary runs them
//! Run with: cargo test --test cogs_test

use async_trait::async_trait;
use futures_util::StreamExt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use cogbot::application::errors::{BotError, MediaError, SocialError};
use cogbot::application::messaging::{CooldownMiddleware, Dispatch, Dispatcher, RoleMiddleware};
use cogbot::application::services::{CommandService, FollowStore, RoleResolver, TemplateCache};
use cogbot::domain::entities::{
    FollowOptions, OutgoingMessage, RenderJob, RuleChange, StreamEvent, StreamRule, Trend, TrendLocation, Tweet,
    TwitterCredentials, TwitterUser, User, UserTokens,
};
use cogbot::domain::traits::{
    Bot, BotInfo, EventStream, FileFetcher, Store, TwitterApi, VideoDownloader, VideoRenderer,
};
use cogbot::infrastructure::storage::JsonStore;
use cogbot::plugins::{CogManager, CoreCog, RaveCog, TweetsCog, TweetsSettings};

static INIT: Once = Once::new();

fn ensure_init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

#[derive(Default)]
struct ChatLog {
    sent: Mutex<Vec<(String, OutgoingMessage)>>,
}

impl ChatLog {
    fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, m)| m.content.clone())
            .collect()
    }

    fn attachments(&self) -> usize {
        self.sent.lock().unwrap().iter().map(|(_, m)| m.attachments.len()).sum()
    }
}

#[async_trait]
impl Bot for ChatLog {
    async fn start(&self) -> Result<(), BotError> {
        Ok(())
    }

    async fn send(&self, chat_id: &str, message: OutgoingMessage) -> Result<String, BotError> {
        self.sent.lock().unwrap().push((chat_id.to_string(), message));
        Ok("1".to_string())
    }

    async fn trigger_typing(&self, _chat_id: &str) -> Result<(), BotError> {
        Ok(())
    }

    fn bot_info(&self) -> BotInfo {
        BotInfo { id: "0".into(), name: "cogbot".into(), username: "cogbot".into() }
    }
}

/// Knows a single account, "ferris"
#[derive(Default)]
struct OneUserTwitter {
    calls: AtomicUsize,
}

impl OneUserTwitter {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn unused<T>(&self) -> Result<T, SocialError> {
        self.hit();
        Err(SocialError::Network("not available in tests".into()))
    }
}

#[async_trait]
impl TwitterApi for OneUserTwitter {
    async fn get_user(&self, _creds: &TwitterCredentials, username: &str) -> Result<Option<TwitterUser>, SocialError> {
        self.hit();
        Ok((username.eq_ignore_ascii_case("ferris")).then(|| TwitterUser {
            id: "7".into(),
            username: "ferris".into(),
            name: "Ferris".into(),
            ..Default::default()
        }))
    }

    async fn get_me(&self, _tokens: &UserTokens) -> Result<TwitterUser, SocialError> {
        self.unused()
    }

    async fn user_tweets(&self, _creds: &TwitterCredentials, _user: &TwitterUser, _max: usize) -> Result<Vec<Tweet>, SocialError> {
        self.unused()
    }

    async fn create_tweet(&self, _tokens: &UserTokens, _text: &str) -> Result<String, SocialError> {
        self.unused()
    }

    async fn available_trends(&self, _creds: &TwitterCredentials) -> Result<Vec<TrendLocation>, SocialError> {
        self.unused()
    }

    async fn place_trends(&self, _creds: &TwitterCredentials, _woeid: i64) -> Result<Vec<Trend>, SocialError> {
        self.unused()
    }

    async fn get_rules(&self, _creds: &TwitterCredentials) -> Result<Vec<StreamRule>, SocialError> {
        self.unused()
    }

    async fn add_rule(&self, _creds: &TwitterCredentials, _tag: &str, _value: &str) -> Result<RuleChange, SocialError> {
        self.unused()
    }

    async fn delete_rules(&self, _creds: &TwitterCredentials, _ids: &[String]) -> Result<RuleChange, SocialError> {
        self.unused()
    }

    async fn filtered_stream(&self, _creds: &TwitterCredentials) -> Result<EventStream, SocialError> {
        self.hit();
        Ok(futures_util::stream::empty::<Result<StreamEvent, SocialError>>().boxed())
    }

    fn authorize_url(&self, _creds: &TwitterCredentials, _state: &str, _verifier: &str) -> Result<String, SocialError> {
        self.unused()
    }

    async fn exchange_code(&self, _creds: &TwitterCredentials, _code: &str, _verifier: &str) -> Result<UserTokens, SocialError> {
        self.unused()
    }
}

/// Downloads instantly, renders slower than the cog is willing to wait
struct SlowStudio;

#[async_trait]
impl VideoDownloader for SlowStudio {
    async fn download(&self, _link: &str, destination: &Path) -> Result<(), MediaError> {
        tokio::fs::write(destination, b"template").await?;
        Ok(())
    }
}

#[async_trait]
impl FileFetcher for SlowStudio {
    async fn fetch(&self, _url: &str, destination: &Path) -> Result<(), MediaError> {
        tokio::fs::write(destination, b"font").await?;
        Ok(())
    }
}

#[async_trait]
impl VideoRenderer for SlowStudio {
    async fn render(&self, job: &RenderJob) -> Result<(), MediaError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        tokio::fs::write(&job.output, b"video").await?;
        Ok(())
    }
}

struct Harness {
    bot: Arc<ChatLog>,
    api: Arc<OneUserTwitter>,
    store: Arc<dyn Store>,
    dispatcher: Dispatcher,
    _dir: tempfile::TempDir,
}

impl Harness {
    async fn new() -> Self {
        ensure_init();
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn Store> = Arc::new(JsonStore::in_memory());
        let bot = Arc::new(ChatLog::default());
        let api = Arc::new(OneUserTwitter::default());

        let mut commands = CommandService::new("!");
        commands.register_defaults();
        let cogs = Arc::new(CogManager::new(commands.shared()));
        cogs.load(Arc::new(CoreCog::new(store.clone()))).await.unwrap();

        let studio = Arc::new(SlowStudio);
        let cache = Arc::new(TemplateCache::new(dir.path(), studio.clone(), studio.clone(), Duration::from_secs(5)));
        let rave = RaveCog::new(cache, studio.clone(), studio).with_render_timeout(Duration::from_millis(50));
        cogs.load(Arc::new(rave)).await.unwrap();

        let settings = TweetsSettings { stream: false, ..Default::default() };
        cogs.load(Arc::new(TweetsCog::new(api.clone(), store.clone(), bot.clone(), settings)))
            .await
            .unwrap();

        let roles = RoleResolver::new(&["owner".into()], &[], &[]);
        let dispatcher = Dispatcher::new(cogs, roles, bot.clone())
            .with_middleware(RoleMiddleware)
            .with_middleware(CooldownMiddleware::new());
        Self { bot, api, store, dispatcher, _dir: dir }
    }

    async fn owner_says(&self, text: &str) -> Dispatch {
        self.dispatcher
            .process_text("555", text, Some(User::new("owner")))
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn twitter_commands_wait_for_api_tokens() {
    let harness = Harness::new().await;

    assert_eq!(harness.owner_says("!twitter stream follow <#600> ferris").await, Dispatch::Invoked);
    assert_eq!(harness.api.calls(), 0);
    assert!(harness.bot.texts()[0].contains("tweetset creds"));
}

#[tokio::test]
async fn owner_sets_tokens_then_follows_an_account() {
    let harness = Harness::new().await;

    harness.owner_says("!set api twitter bearer_token abc").await;
    assert_eq!(harness.bot.texts().last().unwrap(), "`twitter` API tokens have been set.");

    harness.owner_says("!twitter stream follow <#600> ferris --plain").await;
    assert_eq!(harness.bot.texts().last().unwrap(), "Following tweets from ferris in <#600>.");
    assert_eq!(harness.api.calls(), 1);

    harness.owner_says("!tw stream follow 600 ferris").await;
    assert_eq!(harness.bot.texts().last().unwrap(), "I am already following ferris in <#600>.");

    let follows = FollowStore::new(cogbot::application::services::CogConfig::new(harness.store.clone(), "Tweets"));
    let channel = follows.channel("600").await.unwrap();
    assert_eq!(channel.followed_accounts["7"], FollowOptions { embeds: false, ..Default::default() });
}

#[tokio::test]
async fn slow_render_reports_a_timeout_without_a_file() {
    let harness = Harness::new().await;

    assert_eq!(harness.owner_says("!crabrave rust is, gone").await, Dispatch::Invoked);
    assert_eq!(harness.bot.texts(), vec!["Crabrave Video took too long to generate."]);
    assert_eq!(harness.bot.attachments(), 0);
}
