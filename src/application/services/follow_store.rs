//! Per-channel follow sets for the tweets cog

use tokio::sync::Mutex;

use crate::application::errors::StorageError;
use crate::application::services::cog_config::{CogConfig, Scope};
use crate::domain::entities::{
    ChannelFollows, FollowOptions, FollowOutcome, FollowTarget, StreamEvent, UnfollowOutcome,
};

const FOLLOWS_FIELD: &str = "follows";

/// Where and how one stream event should be posted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutTarget {
    pub channel_id: String,
    pub options: FollowOptions,
    pub add_buttons: bool,
}

/// Mapping from channel to followed accounts and rules
pub struct FollowStore {
    config: CogConfig,
    write_lock: Mutex<()>,
}

impl FollowStore {
    pub fn new(config: CogConfig) -> Self {
        Self {
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn channel(&self, channel_id: &str) -> Result<ChannelFollows, StorageError> {
        self.config
            .get_or_default(&Scope::Channel(channel_id.to_string()), FOLLOWS_FIELD)
            .await
    }

    async fn save(&self, channel_id: &str, follows: &ChannelFollows) -> Result<(), StorageError> {
        let scope = Scope::Channel(channel_id.to_string());
        if follows.is_empty() && follows.add_buttons {
            // Nothing left worth keeping
            self.config.clear(&scope, FOLLOWS_FIELD).await
        } else {
            self.config.set(&scope, FOLLOWS_FIELD, follows).await
        }
    }

    /// Follow `target` in a channel
    ///
    /// An existing follow keeps its membership; `options` replaces its settings when given.
    pub async fn follow(
        &self,
        channel_id: &str,
        guild_id: Option<&str>,
        target: &FollowTarget,
        options: Option<FollowOptions>,
    ) -> Result<FollowOutcome, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut follows = self.channel(channel_id).await?;
        if let Some(guild) = guild_id {
            follows.guild_id = Some(guild.to_string());
        }

        let entries = follows.targets_mut(target);
        let outcome = match entries.get_mut(target.key()) {
            Some(existing) => {
                if let Some(options) = options {
                    *existing = options;
                }
                FollowOutcome::Updated
            }
            None => {
                entries.insert(target.key().to_string(), options.unwrap_or_default());
                FollowOutcome::Added
            }
        };

        self.save(channel_id, &follows).await?;
        tracing::debug!("Follow {:?} in {}: {:?}", target, channel_id, outcome);
        Ok(outcome)
    }

    /// Stop following `target`; a target that is not followed leaves the store untouched
    pub async fn unfollow(&self, channel_id: &str, target: &FollowTarget) -> Result<UnfollowOutcome, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut follows = self.channel(channel_id).await?;
        if follows.targets_mut(target).remove(target.key()).is_none() {
            return Ok(UnfollowOutcome::NotFollowed);
        }
        self.save(channel_id, &follows).await?;
        Ok(UnfollowOutcome::Removed)
    }

    /// Flip link buttons for a channel, returning the new value
    pub async fn toggle_buttons(&self, channel_id: &str, guild_id: Option<&str>) -> Result<bool, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut follows = self.channel(channel_id).await?;
        follows.add_buttons = !follows.add_buttons;
        if let Some(guild) = guild_id {
            follows.guild_id = Some(guild.to_string());
        }
        self.save(channel_id, &follows).await?;
        Ok(follows.add_buttons)
    }

    /// Every channel with a stored follow record
    pub async fn all(&self) -> Result<Vec<(String, ChannelFollows)>, StorageError> {
        let mut out = Vec::new();
        for channel_id in self.config.channels_with(FOLLOWS_FIELD).await? {
            let follows = self.channel(&channel_id).await?;
            out.push((channel_id, follows));
        }
        Ok(out)
    }

    /// Channels an event should be posted to, after reply/retweet filtering
    pub async fn targets_for(&self, event: &StreamEvent) -> Result<Vec<FanOutTarget>, StorageError> {
        let tweet = &event.tweet;
        let mut targets = Vec::new();
        for (channel_id, follows) in self.all().await? {
            let Some(options) = follows.options_for(&tweet.author_id, &event.matching_rules) else {
                continue;
            };
            if tweet.is_reply() && !options.replies {
                continue;
            }
            if tweet.is_retweet() && !options.retweets {
                continue;
            }
            targets.push(FanOutTarget {
                channel_id,
                options,
                add_buttons: follows.add_buttons,
            });
        }
        Ok(targets)
    }
}
