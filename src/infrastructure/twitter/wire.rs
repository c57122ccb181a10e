//! JSON shapes of the Twitter API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::{
    StreamEvent, StreamRule, Trend, TrendLocation, Tweet, TweetKind, TwitterUser, UserTokens,
};

#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiError {
    pub fn describe(&self) -> String {
        self.detail
            .clone()
            .or_else(|| self.message.clone())
            .or_else(|| self.title.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

/// Standard v2 response envelope
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub includes: Includes,
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Includes {
    #[serde(default)]
    pub users: Vec<RawUser>,
    #[serde(default)]
    pub media: Vec<RawMedia>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub following_count: u64,
}

#[derive(Debug, Deserialize)]
pub struct RawUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub profile_image_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub public_metrics: PublicMetrics,
    #[serde(default)]
    pub verified: bool,
}

impl From<RawUser> for TwitterUser {
    fn from(raw: RawUser) -> Self {
        TwitterUser {
            id: raw.id,
            username: raw.username,
            name: raw.name,
            description: raw.description,
            profile_image_url: raw.profile_image_url,
            created_at: raw.created_at,
            followers_count: raw.public_metrics.followers_count,
            following_count: raw.public_metrics.following_count,
            verified: raw.verified,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RawMedia {
    pub media_key: String,
    pub url: Option<String>,
    pub preview_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReferencedTweet {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Attachments {
    #[serde(default)]
    pub media_keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawTweet {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub author_id: String,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub referenced_tweets: Vec<ReferencedTweet>,
    #[serde(default)]
    pub attachments: Attachments,
}

impl RawTweet {
    fn kind(&self) -> TweetKind {
        let kinds: Vec<&str> = self.referenced_tweets.iter().map(|r| r.kind.as_str()).collect();
        if kinds.contains(&"retweeted") {
            TweetKind::Retweet
        } else if kinds.contains(&"replied_to") {
            TweetKind::Reply
        } else if kinds.contains(&"quoted") {
            TweetKind::Quote
        } else {
            TweetKind::Original
        }
    }

    /// Build a tweet, resolving its author and first image from `includes`
    pub fn into_tweet(self, includes: &Includes) -> Tweet {
        let kind = self.kind();
        let author = includes
            .users
            .iter()
            .find(|u| u.id == self.author_id)
            .map(|u| TwitterUser {
                id: u.id.clone(),
                username: u.username.clone(),
                name: u.name.clone(),
                profile_image_url: u.profile_image_url.clone(),
                ..Default::default()
            });
        let media_url = self.attachments.media_keys.iter().find_map(|key| {
            includes
                .media
                .iter()
                .find(|m| &m.media_key == key)
                .and_then(|m| m.url.clone().or_else(|| m.preview_image_url.clone()))
        });
        Tweet {
            id: self.id,
            text: self.text,
            author_id: self.author_id,
            author,
            created_at: self.created_at,
            kind,
            media_url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MatchingRule {
    pub id: String,
    pub tag: Option<String>,
}

/// One line of the filtered stream
#[derive(Debug, Deserialize)]
pub struct StreamEnvelope {
    pub data: Option<RawTweet>,
    #[serde(default)]
    pub includes: Includes,
    #[serde(default)]
    pub matching_rules: Vec<MatchingRule>,
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

impl StreamEnvelope {
    pub fn into_event(self) -> Option<StreamEvent> {
        let includes = self.includes;
        let matching_rules = self
            .matching_rules
            .into_iter()
            .map(|r| r.tag.filter(|t| !t.is_empty()).unwrap_or(r.id))
            .collect();
        self.data.map(|raw| StreamEvent {
            tweet: raw.into_tweet(&includes),
            matching_rules,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RawRule {
    pub id: String,
    pub value: String,
    pub tag: Option<String>,
}

impl From<RawRule> for StreamRule {
    fn from(raw: RawRule) -> Self {
        StreamRule {
            id: raw.id,
            value: raw.value,
            tag: raw.tag,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NewRule<'a> {
    pub value: &'a str,
    pub tag: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleRequest<'a> {
    Add(Vec<NewRule<'a>>),
    Delete { ids: &'a [String] },
}

#[derive(Debug, Deserialize)]
pub struct CreatedTweet {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct RawLocation {
    pub name: String,
    pub woeid: i64,
}

impl From<RawLocation> for TrendLocation {
    fn from(raw: RawLocation) -> Self {
        TrendLocation {
            name: raw.name,
            woeid: raw.woeid,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RawTrend {
    pub name: String,
    #[serde(default)]
    pub url: String,
    pub tweet_volume: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceTrends {
    #[serde(default)]
    pub trends: Vec<RawTrend>,
}

impl From<RawTrend> for Trend {
    fn from(raw: RawTrend) -> Self {
        Trend {
            name: raw.name,
            url: raw.url,
            tweet_volume: raw.tweet_volume,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    pub fn into_tokens(self, now: DateTime<Utc>) -> UserTokens {
        UserTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|secs| now + chrono::Duration::seconds(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_requests_serialize_like_the_api() {
        let add = RuleRequest::Add(vec![NewRule { value: "from:rustlang", tag: "rust" }]);
        assert_eq!(
            serde_json::to_string(&add).unwrap(),
            r#"{"add":[{"value":"from:rustlang","tag":"rust"}]}"#
        );
        let ids = vec!["1".to_string()];
        let delete = RuleRequest::Delete { ids: &ids };
        assert_eq!(serde_json::to_string(&delete).unwrap(), r#"{"delete":{"ids":["1"]}}"#);
    }

    #[test]
    fn user_lookup_maps_metrics() {
        let body = r#"{"data":{"id":"1","username":"rustlang","name":"Rust","description":"lang",
            "created_at":"2010-01-01T00:00:00.000Z","public_metrics":{"followers_count":5,"following_count":2}}}"#;
        let envelope: Envelope<RawUser> = serde_json::from_str(body).unwrap();
        let user: TwitterUser = envelope.data.unwrap().into();
        assert_eq!(user.followers_count, 5);
        assert!(user.created_at.is_some());
    }

    #[test]
    fn reply_tweet_with_media() {
        let body = r#"{"data":[{"id":"2","text":"@x hi","author_id":"1","referenced_tweets":[{"type":"replied_to","id":"1"}],
            "attachments":{"media_keys":["3_1"]}}],
            "includes":{"media":[{"media_key":"3_1","type":"photo","url":"https://pbs.twimg.com/a.jpg"}]}}"#;
        let envelope: Envelope<Vec<RawTweet>> = serde_json::from_str(body).unwrap();
        let includes = envelope.includes;
        let tweet = envelope.data.unwrap().into_iter().next().unwrap().into_tweet(&includes);
        assert_eq!(tweet.kind, TweetKind::Reply);
        assert_eq!(tweet.media_url.as_deref(), Some("https://pbs.twimg.com/a.jpg"));
        assert!(tweet.author.is_none());
    }
}
