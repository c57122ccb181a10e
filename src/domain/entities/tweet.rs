use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A Twitter account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TwitterUser {
    pub id: String,
    pub username: String,
    pub name: String,
    pub description: String,
    pub profile_image_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub followers_count: u64,
    pub following_count: u64,
    pub verified: bool,
}

impl TwitterUser {
    pub fn profile_url(&self) -> String {
        format!("https://twitter.com/{}", self.username)
    }
}

/// How a tweet relates to another one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweetKind {
    Original,
    Reply,
    Retweet,
    Quote,
}

/// A single tweet, optionally with its author expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tweet {
    pub id: String,
    pub text: String,
    pub author_id: String,
    pub author: Option<TwitterUser>,
    pub created_at: Option<DateTime<Utc>>,
    pub kind: TweetKind,
    pub media_url: Option<String>,
}

impl Tweet {
    pub fn url(&self) -> String {
        let username = self.author.as_ref().map(|a| a.username.as_str()).unwrap_or("i");
        format!("https://twitter.com/{}/status/{}", username, self.id)
    }

    pub fn is_reply(&self) -> bool {
        self.kind == TweetKind::Reply
    }

    pub fn is_retweet(&self) -> bool {
        self.kind == TweetKind::Retweet
    }
}

/// One event from the filtered stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub tweet: Tweet,
    /// Tags of the rules that matched; untagged rules contribute their id
    pub matching_rules: Vec<String>,
}

/// Server-side filter for the filtered stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRule {
    pub id: String,
    pub value: String,
    pub tag: Option<String>,
}

impl StreamRule {
    pub fn label(&self) -> String {
        match &self.tag {
            Some(tag) => format!("{} ({})", tag, self.id),
            None => self.id.clone(),
        }
    }
}

/// Outcome of adding or deleting stream rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleChange {
    pub errors: Vec<String>,
}

impl RuleChange {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendLocation {
    pub name: String,
    pub woeid: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trend {
    pub name: String,
    pub url: String,
    pub tweet_volume: Option<u64>,
}

/// App-level API credentials from the shared token store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TwitterCredentials {
    pub bearer_token: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

/// OAuth2 user-context tokens saved per chat user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl UserTokens {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// Per-channel settings in the legacy account list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelData {
    pub guild: String,
    #[serde(default)]
    pub replies: bool,
    #[serde(default = "default_true")]
    pub retweets: bool,
    #[serde(default = "default_true")]
    pub embeds: bool,
}

fn default_true() -> bool {
    true
}

/// Account record from the older polling design
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TweetEntry {
    pub twitter_id: String,
    pub twitter_name: String,
    #[serde(default)]
    pub last_tweet: u64,
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelData>,
}
