//! Cog trait definitions

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::application::errors::{BotError, CommandError};
use crate::application::messaging::parser::Arguments;
use crate::domain::entities::{Command, Message, OutgoingMessage, Role};
use crate::domain::traits::Bot;

/// A plugin module loaded into the bot
#[async_trait]
pub trait Cog: Send + Sync {
    /// Unique identifier for the cog
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    fn version(&self) -> &str;

    /// Commands this cog answers; the manager tags them with the cog name
    fn commands(&self) -> Vec<Command>;

    /// Run one of this cog's commands, identified by `ctx.command.qualified_name`
    async fn invoke(&self, ctx: CommandContext) -> Result<(), CommandError>;

    async fn on_load(&self) -> Result<(), BotError> {
        Ok(())
    }

    async fn on_unload(&self) {}

    /// Remove everything stored about a user
    async fn delete_user_data(&self, _user_id: &str) -> Result<(), BotError> {
        Ok(())
    }

    /// Extra lines for cog help, such as tool versions
    async fn metadata(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

/// One command invocation as seen by a cog
pub struct CommandContext {
    pub message: Message,
    pub command: Command,
    pub args: Arguments,
    pub role: Role,
    pub prefix: String,
    pub bot: Arc<dyn Bot>,
}

impl CommandContext {
    pub fn chat_id(&self) -> &str {
        &self.message.chat_id
    }

    pub fn guild_id(&self) -> Option<&str> {
        self.message.guild_id.as_deref()
    }

    pub fn author_id(&self) -> &str {
        self.message.sender_id().unwrap_or("unknown")
    }

    pub async fn say(&self, text: impl AsRef<str> + Send) -> Result<String, BotError> {
        self.bot.send_message(&self.message.chat_id, text.as_ref()).await
    }

    pub async fn send(&self, message: OutgoingMessage) -> Result<String, BotError> {
        self.bot.send(&self.message.chat_id, message).await
    }

    /// Show the typing indicator; failures are only logged
    pub async fn typing(&self) {
        if let Err(e) = self.bot.trigger_typing(&self.message.chat_id).await {
            tracing::debug!("Failed to trigger typing in {}: {}", self.message.chat_id, e);
        }
    }

    /// Usage line for the current command
    pub fn usage(&self) -> String {
        match &self.command.usage {
            Some(usage) => format!("Usage: {}{}", self.prefix, usage),
            None => format!("Usage: {}{}", self.prefix, self.command.qualified_name),
        }
    }

    pub fn missing_argument(&self, name: &str) -> CommandError {
        CommandError::InvalidArgs(format!("Missing argument `{}`.\n{}", name, self.usage()))
    }
}
