//! Background task that keeps the filtered stream connected

use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;

use super::auth::{credentials_from, SERVICE};
use super::relay::Relay;
use crate::application::errors::SocialError;
use crate::application::services::{ApiTokens, CogConfig, Scope};
use crate::domain::traits::{Bot, TwitterApi};

pub const ERROR_CHANNEL_FIELD: &str = "error_channel";
pub const ERROR_GUILD_FIELD: &str = "error_guild";

pub struct StreamRunner {
    api: Arc<dyn TwitterApi>,
    tokens: ApiTokens,
    config: CogConfig,
    bot: Arc<dyn Bot>,
    relay: Relay,
    reconnect: Duration,
}

impl StreamRunner {
    pub fn new(
        api: Arc<dyn TwitterApi>,
        tokens: ApiTokens,
        config: CogConfig,
        bot: Arc<dyn Bot>,
        relay: Relay,
        reconnect: Duration,
    ) -> Self {
        Self { api, tokens, config, bot, relay, reconnect }
    }

    /// Connect once and relay events until the stream ends or fails
    pub async fn run_once(&self) -> Result<usize, SocialError> {
        let creds = credentials_from(&self.tokens.get(SERVICE).await?);
        if creds.bearer_token.is_empty() {
            return Err(SocialError::MissingToken);
        }

        let mut stream = self.api.filtered_stream(&creds).await?;
        tracing::info!("Connected to the Twitter filtered stream");
        let mut relayed = 0;
        while let Some(item) = stream.next().await {
            let event = match item {
                Ok(event) => event,
                Err(SocialError::Parse(e)) => {
                    tracing::warn!("Skipping unreadable stream event: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            match self.relay.deliver(&event).await {
                Ok(_) => relayed += 1,
                Err(e) => tracing::error!("Error relaying tweet {}: {}", event.tweet.id, e),
            }
        }
        Ok(relayed)
    }

    /// Keep the stream running, reconnecting after `reconnect` on every exit
    pub async fn run(self: Arc<Self>) {
        loop {
            match self.run_once().await {
                Ok(relayed) => tracing::info!("Twitter stream closed after {} events, reconnecting", relayed),
                Err(SocialError::MissingToken) => tracing::debug!("Waiting for Twitter API tokens"),
                Err(e) => self.report(&format!("Twitter stream error: {}", e)).await,
            }
            tokio::time::sleep(self.reconnect).await;
        }
    }

    /// Log an error and post it in the configured error channel
    pub async fn report(&self, text: &str) {
        tracing::error!("{}", text);
        let channel: Option<String> = match self.config.get(&Scope::Global, ERROR_CHANNEL_FIELD).await {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!("Could not read the error channel: {}", e);
                None
            }
        };
        if let Some(channel) = channel {
            if let Err(e) = self.bot.send_message(&channel, text).await {
                tracing::warn!("Could not post to error channel {}: {}", channel, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::FollowStore;
    use crate::domain::entities::{FollowTarget, StreamEvent, Tweet, TweetKind};
    use crate::domain::traits::Store;
    use crate::infrastructure::storage::JsonStore;
    use crate::testing::{FakeTwitter, RecordingBot};
    use std::collections::BTreeMap;

    fn event(id: &str) -> StreamEvent {
        StreamEvent {
            tweet: Tweet {
                id: id.into(),
                text: "hi".into(),
                author_id: "7".into(),
                author: None,
                created_at: None,
                kind: TweetKind::Original,
                media_url: None,
            },
            matching_rules: vec![],
        }
    }

    async fn runner(api: Arc<FakeTwitter>, with_token: bool) -> (Arc<RecordingBot>, CogConfig, StreamRunner) {
        let kv: Arc<dyn Store> = Arc::new(JsonStore::in_memory());
        let tokens = ApiTokens::new(CogConfig::new(kv.clone(), "Core"));
        if with_token {
            let mut twitter = BTreeMap::new();
            twitter.insert("bearer_token".to_string(), "t".to_string());
            tokens.set(SERVICE, &twitter).await.unwrap();
        }
        let config = CogConfig::new(kv, "Tweets");
        let follows = Arc::new(FollowStore::new(config.clone()));
        follows.follow("c1", None, &FollowTarget::Account("7".into()), None).await.unwrap();
        let bot = Arc::new(RecordingBot::default());
        let relay = Relay::new(bot.clone(), follows, 1);
        let runner = StreamRunner::new(api, tokens, config.clone(), bot.clone(), relay, Duration::from_millis(10));
        (bot, config, runner)
    }

    #[tokio::test]
    async fn missing_token_never_connects() {
        let api = Arc::new(FakeTwitter::default());
        let (_, _, runner) = runner(api.clone(), false).await;
        assert!(matches!(runner.run_once().await, Err(SocialError::MissingToken)));
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn relays_until_the_stream_fails() {
        let api = Arc::new(FakeTwitter::default());
        api.stream.lock().unwrap().push(vec![
            Ok(event("1")),
            Ok(event("2")),
            Err(SocialError::Network("reset".into())),
            Ok(event("3")),
        ]);
        let (bot, _, runner) = runner(api, true).await;
        assert!(matches!(runner.run_once().await, Err(SocialError::Network(_))));
        assert_eq!(bot.messages().len(), 2);
    }

    #[tokio::test]
    async fn unreadable_events_are_skipped() {
        let api = Arc::new(FakeTwitter::default());
        api.stream.lock().unwrap().push(vec![
            Ok(event("1")),
            Err(SocialError::Parse("expected value at line 1".into())),
            Ok(event("2")),
        ]);
        let (bot, _, runner) = runner(api, true).await;
        assert_eq!(runner.run_once().await.unwrap(), 2);
        assert_eq!(bot.messages().len(), 2);
    }

    #[tokio::test]
    async fn errors_reach_the_error_channel() {
        let api = Arc::new(FakeTwitter::default());
        let (bot, config, runner) = runner(api, true).await;
        runner.report("boom").await;
        assert!(bot.messages().is_empty());

        config.set(&Scope::Global, ERROR_CHANNEL_FIELD, "errors").await.unwrap();
        runner.report("boom").await;
        assert_eq!(bot.messages()[0].0, "errors");
        assert_eq!(bot.last_text(), "boom");
    }
}
