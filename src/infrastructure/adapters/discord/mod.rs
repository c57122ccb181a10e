//! Discord REST adapter

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::application::errors::BotError;
use crate::application::messaging::Dispatcher;
use crate::domain::entities::{Message, OutgoingMessage, User};
use crate::domain::traits::{Bot, BotInfo};
use crate::infrastructure::config::WatchedChannel;

/// Discord API base URL
pub const API_BASE: &str = "https://discord.com/api/v10";

/// Link buttons per action row
const BUTTONS_PER_ROW: usize = 5;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscordMessage {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub content: String,
    pub author: DiscordUser,
    #[serde(default)]
    pub mentions: Vec<DiscordUser>,
}

fn snowflake(id: &str) -> u64 {
    id.parse().unwrap_or(0)
}

/// Discord bot adapter
pub struct DiscordAdapter {
    token: String,
    client: Client,
    api_base: String,
    info: BotInfo,
    channels: Vec<WatchedChannel>,
    poll_interval: Duration,
}

impl DiscordAdapter {
    pub fn new(token: impl Into<String>, channels: Vec<WatchedChannel>) -> Self {
        Self {
            token: token.into(),
            client: Client::new(),
            api_base: API_BASE.to_string(),
            info: BotInfo {
                id: "unknown".to_string(),
                name: "cogbot".to_string(),
                username: "cogbot".to_string(),
            },
            channels,
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Get the API URL for a path
    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, BotError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => BotError::RateLimited(body),
            StatusCode::UNAUTHORIZED => BotError::Auth(body),
            StatusCode::NOT_FOUND => BotError::NotFound(body),
            _ => BotError::Network(format!("Discord API error {}: {}", status, body)),
        })
    }

    /// Fetch bot info from the Discord API
    pub async fn fetch_bot_info(&mut self) -> Result<(), BotError> {
        let response = self
            .client
            .get(self.api_url("/users/@me"))
            .header("Authorization", self.auth())
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;
        let me: DiscordUser = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| BotError::Parse(e.to_string()))?;

        self.info = BotInfo {
            id: me.id,
            name: me.global_name.unwrap_or_else(|| me.username.clone()),
            username: me.username,
        };
        Ok(())
    }

    /// Messages in a channel newer than `after`, oldest first
    pub async fn get_messages(&self, channel_id: &str, after: Option<&str>, limit: u8) -> Result<Vec<DiscordMessage>, BotError> {
        let mut request = self
            .client
            .get(self.api_url(&format!("/channels/{}/messages", channel_id)))
            .header("Authorization", self.auth())
            .query(&[("limit", limit.to_string())]);
        if let Some(after) = after {
            request = request.query(&[("after", after)]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;
        let mut messages: Vec<DiscordMessage> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| BotError::Parse(e.to_string()))?;
        messages.sort_by_key(|m| snowflake(&m.id));
        Ok(messages)
    }

    /// JSON body for a message; attachments are referenced by index
    pub fn message_payload(message: &OutgoingMessage) -> serde_json::Value {
        let mut payload = json!({
            "content": message.content.clone().unwrap_or_default(),
            "allowed_mentions": { "parse": [] },
        });
        if !message.embeds.is_empty() {
            payload["embeds"] = json!(message.embeds);
        }
        if !message.buttons.is_empty() {
            let rows: Vec<serde_json::Value> = message
                .buttons
                .chunks(BUTTONS_PER_ROW)
                .map(|row| {
                    let buttons: Vec<serde_json::Value> = row
                        .iter()
                        .map(|b| json!({ "type": 2, "style": 5, "label": b.label, "url": b.url }))
                        .collect();
                    json!({ "type": 1, "components": buttons })
                })
                .collect();
            payload["components"] = json!(rows);
        }
        if message.has_files() {
            let attachments: Vec<serde_json::Value> = message
                .attachments
                .iter()
                .enumerate()
                .map(|(i, a)| json!({ "id": i, "filename": a.filename }))
                .collect();
            payload["attachments"] = json!(attachments);
        }
        payload
    }

    /// Turn a polled message into a framework message
    pub fn to_message(&self, channel: &WatchedChannel, raw: &DiscordMessage, dispatcher: &Dispatcher) -> Message {
        let author = &raw.author;
        let mut sender = User::new(&author.id).with_username(&author.username);
        if let Some(name) = &author.global_name {
            sender = sender.with_display_name(name);
        }
        if author.bot {
            sender = sender.as_bot();
        }

        let mut message = dispatcher
            .parser()
            .parse(&raw.channel_id, &raw.content, Some(sender))
            .with_id(&raw.id)
            .with_platform("discord");
        message.guild_id = channel.guild_id.clone();
        for user in &raw.mentions {
            let name = user.global_name.as_deref().unwrap_or(&user.username);
            message = message.with_mention(&user.id, name);
        }
        message
    }

    /// Poll the watched channels and dispatch every new message on its own task
    pub async fn poll_loop(self: Arc<Self>, dispatcher: Arc<Dispatcher>) -> Result<(), BotError> {
        let mut cursors: HashMap<String, Option<String>> = HashMap::new();
        for channel in &self.channels {
            // Start after the newest existing message so history is not replayed
            let latest = match self.get_messages(&channel.id, None, 1).await {
                Ok(messages) => messages.last().map(|m| m.id.clone()),
                Err(e) => {
                    tracing::warn!("Could not read channel {}: {}", channel.id, e);
                    None
                }
            };
            cursors.insert(channel.id.clone(), latest);
        }
        tracing::info!("Polling {} Discord channels", self.channels.len());

        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            for channel in &self.channels {
                let cursor = cursors.get(&channel.id).cloned().flatten();
                let messages = match self.get_messages(&channel.id, cursor.as_deref(), 50).await {
                    Ok(messages) => messages,
                    Err(BotError::RateLimited(body)) => {
                        tracing::warn!("Rate limited polling {}: {}", channel.id, body);
                        tokio::time::sleep(self.poll_interval * 2).await;
                        continue;
                    }
                    Err(e) => {
                        tracing::error!("Error polling {}: {}", channel.id, e);
                        continue;
                    }
                };

                for raw in messages {
                    cursors.insert(channel.id.clone(), Some(raw.id.clone()));
                    if raw.author.id == self.info.id {
                        continue;
                    }
                    let message = self.to_message(channel, &raw, &dispatcher);
                    if !message.content.is_command() {
                        continue;
                    }
                    let dispatcher = dispatcher.clone();
                    tokio::spawn(async move {
                        if let Err(e) = dispatcher.dispatch(message).await {
                            tracing::error!("Error handling message: {}", e);
                        }
                    });
                }
            }
        }
    }
}

#[async_trait]
impl Bot for DiscordAdapter {
    async fn start(&self) -> Result<(), BotError> {
        tracing::info!("Starting Discord bot as {}", self.info.username);
        Ok(())
    }

    async fn send(&self, chat_id: &str, message: OutgoingMessage) -> Result<String, BotError> {
        #[derive(Deserialize)]
        struct Created {
            id: String,
        }

        let url = self.api_url(&format!("/channels/{}/messages", chat_id));
        let payload = Self::message_payload(&message);
        let request = self.client.post(&url).header("Authorization", self.auth());

        let request = if message.has_files() {
            let mut form = Form::new().text("payload_json", payload.to_string());
            for (i, attachment) in message.attachments.iter().enumerate() {
                let data = tokio::fs::read(&attachment.path).await?;
                let part = Part::bytes(data).file_name(attachment.filename.clone());
                form = form.part(format!("files[{}]", i), part);
            }
            request.multipart(form)
        } else {
            request.json(&payload)
        };

        let response = request
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;
        let created: Created = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| BotError::Parse(e.to_string()))?;
        Ok(created.id)
    }

    async fn trigger_typing(&self, chat_id: &str) -> Result<(), BotError> {
        let response = self
            .client
            .post(self.api_url(&format!("/channels/{}/typing", chat_id)))
            .header("Authorization", self.auth())
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: &str, message_id: &str) -> Result<(), BotError> {
        let response = self
            .client
            .delete(self.api_url(&format!("/channels/{}/messages/{}", chat_id, message_id)))
            .header("Authorization", self.auth())
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;
        Self::check(response).await?;
        Ok(())
    }

    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Attachment, Embed, LinkButton};

    #[test]
    fn payload_includes_embeds_and_button_rows() {
        let mut message = OutgoingMessage::embed(Embed::new().title("hi").colour(0x1DA1F2));
        for i in 0..6 {
            message = message.with_button(LinkButton::new(format!("b{}", i), "https://twitter.com"));
        }
        let payload = DiscordAdapter::message_payload(&message);
        assert_eq!(payload["embeds"][0]["title"], "hi");
        assert_eq!(payload["embeds"][0]["color"], 0x1DA1F2);
        let rows = payload["components"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["components"].as_array().unwrap().len(), 5);
        assert_eq!(rows[1]["components"][0]["style"], 5);
        assert!(payload.get("attachments").is_none());
    }

    #[test]
    fn file_payload_references_attachments() {
        let message = OutgoingMessage::file(Attachment::new("/tmp/1crabrave.mp4", "crabrave.mp4"));
        let payload = DiscordAdapter::message_payload(&message);
        assert_eq!(payload["attachments"][0]["filename"], "crabrave.mp4");
        assert_eq!(payload["content"], "");
    }

    #[test]
    fn polled_messages_sort_by_snowflake() {
        let raw = r#"[{"id":"20","channel_id":"1","content":"b","author":{"id":"5","username":"u"}},
                      {"id":"3","channel_id":"1","content":"a","author":{"id":"5","username":"u","bot":true}}]"#;
        let mut messages: Vec<DiscordMessage> = serde_json::from_str(raw).unwrap();
        messages.sort_by_key(|m| snowflake(&m.id));
        assert_eq!(messages[0].id, "3");
        assert!(messages[0].author.bot);
    }
}
