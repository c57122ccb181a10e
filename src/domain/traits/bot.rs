use async_trait::async_trait;
use crate::domain::entities::OutgoingMessage;
use crate::application::errors::BotError;

/// Bot trait - abstraction for messaging platform adapters
#[async_trait]
pub trait Bot: Send + Sync {
    /// Start the bot and check the connection
    async fn start(&self) -> Result<(), BotError>;

    /// Send a message to a chat, returning the new message id
    async fn send(&self, chat_id: &str, message: OutgoingMessage) -> Result<String, BotError>;

    /// Show a typing indicator
    async fn trigger_typing(&self, chat_id: &str) -> Result<(), BotError>;

    /// Delete a message; adapters without deletion return Ok
    async fn delete_message(&self, _chat_id: &str, _message_id: &str) -> Result<(), BotError> {
        Ok(())
    }

    /// Get bot info
    fn bot_info(&self) -> BotInfo;

    /// Send a plain text message
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<String, BotError> {
        self.send(chat_id, OutgoingMessage::text(text)).await
    }
}

/// Bot information
#[derive(Debug, Clone)]
pub struct BotInfo {
    pub id: String,
    pub name: String,
    pub username: String,
}
