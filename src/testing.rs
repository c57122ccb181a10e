//! Test doubles shared by unit tests

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::application::errors::{BotError, MediaError, SocialError};
use crate::application::messaging::parser::Arguments;
use crate::domain::entities::{
    Command, Message, OutgoingMessage, RenderJob, Role, RuleChange, StreamEvent, StreamRule, Trend,
    TrendLocation, Tweet, TwitterCredentials, TwitterUser, User, UserTokens,
};
use crate::domain::traits::{Bot, BotInfo, EventStream, FileFetcher, TwitterApi, VideoDownloader, VideoRenderer};
use crate::plugins::trait_def::CommandContext;

/// Bot that keeps everything it was asked to send
#[derive(Default)]
pub struct RecordingBot {
    pub sent: Mutex<Vec<(String, OutgoingMessage)>>,
    pub deleted: Mutex<Vec<String>>,
}

impl RecordingBot {
    pub fn messages(&self) -> Vec<(String, OutgoingMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|(_, m)| m.content)
            .collect()
    }

    pub fn last_text(&self) -> String {
        self.texts().pop().unwrap_or_default()
    }
}

#[async_trait]
impl Bot for RecordingBot {
    async fn start(&self) -> Result<(), BotError> {
        Ok(())
    }

    async fn send(&self, chat_id: &str, message: OutgoingMessage) -> Result<String, BotError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((chat_id.to_string(), message));
        Ok(sent.len().to_string())
    }

    async fn trigger_typing(&self, _chat_id: &str) -> Result<(), BotError> {
        Ok(())
    }

    async fn delete_message(&self, _chat_id: &str, message_id: &str) -> Result<(), BotError> {
        self.deleted.lock().unwrap().push(message_id.to_string());
        Ok(())
    }

    fn bot_info(&self) -> BotInfo {
        BotInfo { id: "0".into(), name: "test".into(), username: "test".into() }
    }
}

/// Build an invocation context for `command` as if typed in `chat`
pub fn context(bot: Arc<RecordingBot>, command: Command, args: &str, role: Role) -> CommandContext {
    let message = Message::from_command("chat", command.name.clone(), args)
        .with_id("1001")
        .with_guild("guild")
        .with_sender(User::new("user-1").with_username("palm"));
    CommandContext {
        message,
        command,
        args: Arguments::new(args),
        role,
        prefix: "!".to_string(),
        bot,
    }
}

/// Command at a space-separated `path` with the names a loaded cog would see
pub fn find_command(commands: Vec<Command>, cog: &str, path: &str) -> Command {
    let mut words = path.split_whitespace();
    let first = words.next().unwrap();
    let mut command = commands
        .into_iter()
        .map(|c| c.owned_by(cog))
        .find(|c| c.matches(first))
        .unwrap();
    for word in words {
        command = command.find_subcommand(word).cloned().unwrap();
    }
    command
}

/// Writes a small file to the destination
pub struct FakeDownloader {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl FakeDownloader {
    pub fn working() -> Self {
        Self { calls: AtomicUsize::new(0), fail: false }
    }

    pub fn broken() -> Self {
        Self { calls: AtomicUsize::new(0), fail: true }
    }
}

#[async_trait]
impl VideoDownloader for FakeDownloader {
    async fn download(&self, link: &str, destination: &Path) -> Result<(), MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(MediaError::Download(link.to_string()));
        }
        tokio::fs::write(destination, b"template").await?;
        Ok(())
    }

    async fn version(&self) -> Option<String> {
        Some("2024.01.01".to_string())
    }
}

#[async_trait]
impl FileFetcher for FakeDownloader {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<(), MediaError> {
        VideoDownloader::download(self, url, destination).await
    }
}

/// Renderer that waits `delay`, then writes the output file
pub struct FakeRenderer {
    pub delay: Duration,
    pub jobs: Mutex<Vec<RenderJob>>,
}

impl FakeRenderer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, jobs: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl VideoRenderer for FakeRenderer {
    async fn render(&self, job: &RenderJob) -> Result<(), MediaError> {
        self.jobs.lock().unwrap().push(job.clone());
        tokio::time::sleep(self.delay).await;
        tokio::fs::write(&job.output, b"video").await?;
        Ok(())
    }
}

/// In-memory Twitter that counts every call
#[derive(Default)]
pub struct FakeTwitter {
    pub calls: AtomicUsize,
    pub users: BTreeMap<String, TwitterUser>,
    pub rules: Mutex<Vec<StreamRule>>,
    pub tweets: Vec<Tweet>,
    pub locations: Vec<TrendLocation>,
    pub trends: Vec<Trend>,
    pub posted: Mutex<Vec<String>>,
    pub stream: Mutex<Vec<Vec<Result<StreamEvent, SocialError>>>>,
    pub trends_delay: Option<Duration>,
}

impl FakeTwitter {
    pub fn with_user(mut self, id: &str, username: &str) -> Self {
        self.users.insert(
            username.to_lowercase(),
            TwitterUser {
                id: id.to_string(),
                username: username.to_string(),
                name: username.to_string(),
                ..Default::default()
            },
        );
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TwitterApi for FakeTwitter {
    async fn get_user(&self, _creds: &TwitterCredentials, username: &str) -> Result<Option<TwitterUser>, SocialError> {
        self.hit();
        Ok(self.users.get(&username.trim_start_matches('@').to_lowercase()).cloned())
    }

    async fn get_me(&self, _tokens: &UserTokens) -> Result<TwitterUser, SocialError> {
        self.hit();
        self.users
            .values()
            .next()
            .cloned()
            .ok_or_else(|| SocialError::NotFound("me".into()))
    }

    async fn user_tweets(&self, _creds: &TwitterCredentials, _user: &TwitterUser, max: usize) -> Result<Vec<Tweet>, SocialError> {
        self.hit();
        Ok(self.tweets.iter().take(max).cloned().collect())
    }

    async fn create_tweet(&self, _tokens: &UserTokens, text: &str) -> Result<String, SocialError> {
        self.hit();
        self.posted.lock().unwrap().push(text.to_string());
        Ok("1".to_string())
    }

    async fn available_trends(&self, _creds: &TwitterCredentials) -> Result<Vec<TrendLocation>, SocialError> {
        self.hit();
        if let Some(delay) = self.trends_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.locations.clone())
    }

    async fn place_trends(&self, _creds: &TwitterCredentials, _woeid: i64) -> Result<Vec<Trend>, SocialError> {
        self.hit();
        Ok(self.trends.clone())
    }

    async fn get_rules(&self, _creds: &TwitterCredentials) -> Result<Vec<StreamRule>, SocialError> {
        self.hit();
        Ok(self.rules.lock().unwrap().clone())
    }

    async fn add_rule(&self, _creds: &TwitterCredentials, tag: &str, value: &str) -> Result<RuleChange, SocialError> {
        self.hit();
        let mut rules = self.rules.lock().unwrap();
        let id = (rules.len() + 1).to_string();
        rules.push(StreamRule { id, value: value.to_string(), tag: Some(tag.to_string()) });
        Ok(RuleChange::default())
    }

    async fn delete_rules(&self, _creds: &TwitterCredentials, ids: &[String]) -> Result<RuleChange, SocialError> {
        self.hit();
        self.rules.lock().unwrap().retain(|r| !ids.contains(&r.id));
        Ok(RuleChange::default())
    }

    async fn filtered_stream(&self, _creds: &TwitterCredentials) -> Result<EventStream, SocialError> {
        use futures_util::StreamExt;
        self.hit();
        let next = {
            let mut streams = self.stream.lock().unwrap();
            if streams.is_empty() {
                Vec::new()
            } else {
                streams.remove(0)
            }
        };
        Ok(futures_util::stream::iter(next).boxed())
    }

    fn authorize_url(&self, _creds: &TwitterCredentials, state: &str, verifier: &str) -> Result<String, SocialError> {
        self.hit();
        Ok(format!("https://twitter.com/i/oauth2/authorize?state={}&code_challenge={}", state, verifier))
    }

    async fn exchange_code(&self, _creds: &TwitterCredentials, code: &str, _verifier: &str) -> Result<UserTokens, SocialError> {
        self.hit();
        Ok(UserTokens {
            access_token: format!("token-{}", code),
            refresh_token: None,
            expires_at: None,
        })
    }
}
