//! Twitter API client

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::stream::ndjson_events;
use super::wire::{
    CreatedTweet, Envelope, NewRule, PlaceTrends, RawLocation, RawRule, RawTweet, RawUser,
    RuleRequest, TokenResponse,
};
use crate::application::errors::SocialError;
use crate::domain::entities::{
    RuleChange, StreamRule, Trend, TrendLocation, Tweet, TwitterCredentials, TwitterUser, UserTokens,
};
use crate::domain::traits::{EventStream, TwitterApi};

/// Default API base URL
pub const API_BASE: &str = "https://api.twitter.com";

const AUTHORIZE_URL: &str = "https://twitter.com/i/oauth2/authorize";
const SCOPES: &str = "tweet.read tweet.write users.read offline.access";
const USER_FIELDS: &str = "created_at,description,profile_image_url,public_metrics,verified";
const TWEET_FIELDS: &str = "created_at,author_id,referenced_tweets,attachments";

pub struct TwitterClient {
    client: Client,
    base: String,
    timeout: Duration,
}

impl TwitterClient {
    pub fn new(base: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn app(&self, creds: &TwitterCredentials, request: RequestBuilder) -> Result<RequestBuilder, SocialError> {
        if creds.bearer_token.is_empty() {
            return Err(SocialError::MissingToken);
        }
        Ok(request.bearer_auth(&creds.bearer_token).timeout(self.timeout))
    }

    fn user(&self, tokens: &UserTokens, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&tokens.access_token).timeout(self.timeout)
    }

    /// Send a request and decode a successful JSON body
    async fn json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, SocialError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("Twitter API returned {}: {}", status, body);
            return Err(match status.as_u16() {
                404 => SocialError::NotFound(body),
                code => SocialError::Api {
                    status: code,
                    message: error_message(&body),
                },
            });
        }
        Ok(response.json().await?)
    }

    fn rule_change<T>(envelope: Envelope<T>) -> RuleChange {
        RuleChange {
            errors: envelope.errors.iter().map(|e| e.describe()).collect(),
        }
    }
}

impl Default for TwitterClient {
    fn default() -> Self {
        Self::new(API_BASE, Duration::from_secs(10))
    }
}

/// Best-effort readable message from an error body
fn error_message(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct Problem {
        detail: Option<String>,
        title: Option<String>,
    }
    match serde_json::from_str::<Problem>(body) {
        Ok(Problem { detail: Some(detail), .. }) => detail,
        Ok(Problem { title: Some(title), .. }) => title,
        _ => body.chars().take(200).collect(),
    }
}

#[async_trait]
impl TwitterApi for TwitterClient {
    async fn get_user(&self, creds: &TwitterCredentials, username: &str) -> Result<Option<TwitterUser>, SocialError> {
        let username = username.trim_start_matches('@');
        let request = self
            .client
            .get(self.url(&format!("/2/users/by/username/{}", username)))
            .query(&[("user.fields", USER_FIELDS)]);
        let envelope: Envelope<RawUser> = match Self::json(self.app(creds, request)?).await {
            Ok(envelope) => envelope,
            Err(SocialError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(envelope.data.map(TwitterUser::from))
    }

    async fn get_me(&self, tokens: &UserTokens) -> Result<TwitterUser, SocialError> {
        let request = self
            .client
            .get(self.url("/2/users/me"))
            .query(&[("user.fields", USER_FIELDS)]);
        let envelope: Envelope<RawUser> = Self::json(self.user(tokens, request)).await?;
        envelope
            .data
            .map(TwitterUser::from)
            .ok_or_else(|| SocialError::NotFound("authenticated user".to_string()))
    }

    async fn user_tweets(&self, creds: &TwitterCredentials, user: &TwitterUser, max: usize) -> Result<Vec<Tweet>, SocialError> {
        // The endpoint only accepts 5..=100
        let max_results = max.clamp(5, 100).to_string();
        let request = self
            .client
            .get(self.url(&format!("/2/users/{}/tweets", user.id)))
            .query(&[
                ("max_results", max_results.as_str()),
                ("tweet.fields", TWEET_FIELDS),
                ("expansions", "attachments.media_keys"),
                ("media.fields", "url,preview_image_url"),
            ]);
        let envelope: Envelope<Vec<RawTweet>> = Self::json(self.app(creds, request)?).await?;
        let includes = envelope.includes;
        Ok(envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .take(max)
            .map(|raw| {
                let mut tweet = raw.into_tweet(&includes);
                tweet.author = Some(user.clone());
                tweet
            })
            .collect())
    }

    async fn create_tweet(&self, tokens: &UserTokens, text: &str) -> Result<String, SocialError> {
        let request = self
            .client
            .post(self.url("/2/tweets"))
            .json(&serde_json::json!({ "text": text }));
        let envelope: Envelope<CreatedTweet> = Self::json(self.user(tokens, request)).await?;
        match envelope.data {
            Some(created) => Ok(created.id),
            None => Err(SocialError::Api {
                status: 200,
                message: envelope.errors.first().map(|e| e.describe()).unwrap_or_default(),
            }),
        }
    }

    async fn available_trends(&self, creds: &TwitterCredentials) -> Result<Vec<TrendLocation>, SocialError> {
        let request = self.client.get(self.url("/1.1/trends/available.json"));
        let locations: Vec<RawLocation> = Self::json(self.app(creds, request)?).await?;
        Ok(locations.into_iter().map(TrendLocation::from).collect())
    }

    async fn place_trends(&self, creds: &TwitterCredentials, woeid: i64) -> Result<Vec<Trend>, SocialError> {
        let request = self
            .client
            .get(self.url("/1.1/trends/place.json"))
            .query(&[("id", woeid)]);
        let places: Vec<PlaceTrends> = Self::json(self.app(creds, request)?).await?;
        Ok(places
            .into_iter()
            .flat_map(|p| p.trends)
            .map(Trend::from)
            .collect())
    }

    async fn get_rules(&self, creds: &TwitterCredentials) -> Result<Vec<StreamRule>, SocialError> {
        let request = self.client.get(self.url("/2/tweets/search/stream/rules"));
        let envelope: Envelope<Vec<RawRule>> = Self::json(self.app(creds, request)?).await?;
        Ok(envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(StreamRule::from)
            .collect())
    }

    async fn add_rule(&self, creds: &TwitterCredentials, tag: &str, value: &str) -> Result<RuleChange, SocialError> {
        let body = RuleRequest::Add(vec![NewRule { value, tag }]);
        let request = self
            .client
            .post(self.url("/2/tweets/search/stream/rules"))
            .json(&body);
        let envelope: Envelope<serde_json::Value> = Self::json(self.app(creds, request)?).await?;
        Ok(Self::rule_change(envelope))
    }

    async fn delete_rules(&self, creds: &TwitterCredentials, ids: &[String]) -> Result<RuleChange, SocialError> {
        let body = RuleRequest::Delete { ids };
        let request = self
            .client
            .post(self.url("/2/tweets/search/stream/rules"))
            .json(&body);
        let envelope: Envelope<serde_json::Value> = Self::json(self.app(creds, request)?).await?;
        Ok(Self::rule_change(envelope))
    }

    async fn filtered_stream(&self, creds: &TwitterCredentials) -> Result<EventStream, SocialError> {
        if creds.bearer_token.is_empty() {
            return Err(SocialError::MissingToken);
        }
        let response = self
            .client
            .get(self.url("/2/tweets/search/stream"))
            .query(&[
                ("tweet.fields", TWEET_FIELDS),
                ("expansions", "author_id,attachments.media_keys"),
                ("user.fields", "username,name,profile_image_url"),
                ("media.fields", "url,preview_image_url"),
            ])
            .bearer_auth(&creds.bearer_token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SocialError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        tracing::info!("Connected to the filtered stream");
        Ok(ndjson_events(response.bytes_stream()))
    }

    fn authorize_url(&self, creds: &TwitterCredentials, state: &str, verifier: &str) -> Result<String, SocialError> {
        let client_id = creds.client_id.as_deref().ok_or(SocialError::MissingToken)?;
        let redirect_uri = creds.redirect_uri.as_deref().ok_or(SocialError::MissingToken)?;
        let url = Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("response_type", "code"),
                ("client_id", client_id),
                ("redirect_uri", redirect_uri),
                ("scope", SCOPES),
                ("state", state),
                ("code_challenge", verifier),
                ("code_challenge_method", "plain"),
            ],
        )
        .map_err(|e| SocialError::Parse(e.to_string()))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, creds: &TwitterCredentials, code: &str, verifier: &str) -> Result<UserTokens, SocialError> {
        let client_id = creds.client_id.as_deref().ok_or(SocialError::MissingToken)?;
        let redirect_uri = creds.redirect_uri.as_deref().ok_or(SocialError::MissingToken)?;
        let mut request = self
            .client
            .post(self.url("/2/oauth2/token"))
            .form(&[
                ("code", code),
                ("grant_type", "authorization_code"),
                ("client_id", client_id),
                ("redirect_uri", redirect_uri),
                ("code_verifier", verifier),
            ])
            .timeout(self.timeout);
        if let Some(secret) = &creds.client_secret {
            request = request.basic_auth(client_id, Some(secret));
        }
        let token: TokenResponse = Self::json(request).await?;
        Ok(token.into_tokens(chrono::Utc::now()))
    }
}
