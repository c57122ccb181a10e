use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::application::errors::SocialError;
use crate::domain::entities::{
    RuleChange, StreamEvent, StreamRule, Trend, TrendLocation, Tweet, TwitterCredentials, TwitterUser, UserTokens,
};

/// Events from the filtered stream until the connection drops
pub type EventStream = BoxStream<'static, Result<StreamEvent, SocialError>>;

/// Twitter API surface used by the tweets cog
#[async_trait]
pub trait TwitterApi: Send + Sync {
    /// Look up a user by handle; Ok(None) when it does not exist
    async fn get_user(&self, creds: &TwitterCredentials, username: &str) -> Result<Option<TwitterUser>, SocialError>;

    /// The account that owns `tokens`
    async fn get_me(&self, tokens: &UserTokens) -> Result<TwitterUser, SocialError>;

    /// Most recent tweets of a user, newest first
    async fn user_tweets(&self, creds: &TwitterCredentials, user: &TwitterUser, max: usize) -> Result<Vec<Tweet>, SocialError>;

    /// Post a tweet, returning its id
    async fn create_tweet(&self, tokens: &UserTokens, text: &str) -> Result<String, SocialError>;

    async fn available_trends(&self, creds: &TwitterCredentials) -> Result<Vec<TrendLocation>, SocialError>;
    async fn place_trends(&self, creds: &TwitterCredentials, woeid: i64) -> Result<Vec<Trend>, SocialError>;

    async fn get_rules(&self, creds: &TwitterCredentials) -> Result<Vec<StreamRule>, SocialError>;
    async fn add_rule(&self, creds: &TwitterCredentials, tag: &str, value: &str) -> Result<RuleChange, SocialError>;
    async fn delete_rules(&self, creds: &TwitterCredentials, ids: &[String]) -> Result<RuleChange, SocialError>;

    /// Connect the filtered stream with app credentials
    async fn filtered_stream(&self, creds: &TwitterCredentials) -> Result<EventStream, SocialError>;

    /// URL the user opens to grant access
    fn authorize_url(&self, creds: &TwitterCredentials, state: &str, verifier: &str) -> Result<String, SocialError>;

    /// Trade an authorization code for user tokens
    async fn exchange_code(&self, creds: &TwitterCredentials, code: &str, verifier: &str) -> Result<UserTokens, SocialError>;
}
