//! Console adapter for development/testing

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::application::errors::BotError;
use crate::application::messaging::Dispatcher;
use crate::domain::entities::{OutgoingMessage, User};
use crate::domain::traits::{Bot, BotInfo};

/// Chat id used for everything typed on stdin
pub const CONSOLE_CHAT: &str = "console";

/// Console bot adapter for local development
pub struct ConsoleAdapter {
    info: BotInfo,
}

impl ConsoleAdapter {
    pub fn new() -> Self {
        Self {
            info: BotInfo {
                id: "console".to_string(),
                name: "cogbot".to_string(),
                username: "console".to_string(),
            },
        }
    }

    /// Render a message the way it is printed
    pub fn render(message: &OutgoingMessage) -> String {
        let mut lines = Vec::new();
        if let Some(content) = message.content.as_deref().filter(|c| !c.is_empty()) {
            lines.push(content.to_string());
        }
        for embed in &message.embeds {
            lines.push(embed.to_plain_text());
        }
        for button in &message.buttons {
            lines.push(format!("[{}] {}", button.label, button.url));
        }
        for attachment in &message.attachments {
            lines.push(format!("[file {}] {}", attachment.filename, attachment.path.display()));
        }
        lines.join("\n")
    }

    /// Read commands from stdin until EOF
    pub async fn run(dispatcher: Arc<Dispatcher>, user_id: &str) -> Result<(), BotError> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("Type commands with prefix '{}'. Ctrl-D to quit.", dispatcher.parser().prefix());

        while let Some(line) = lines.next_line().await? {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            let sender = User::new(user_id).with_username(user_id);
            let message = dispatcher
                .parser()
                .parse(CONSOLE_CHAT, line, Some(sender))
                .with_platform("console");
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                if let Err(e) = dispatcher.dispatch(message).await {
                    tracing::error!("Error handling message: {}", e);
                }
            });
        }
        Ok(())
    }
}

impl Default for ConsoleAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Bot for ConsoleAdapter {
    async fn start(&self) -> Result<(), BotError> {
        tracing::info!("Starting console bot (dev mode)");
        Ok(())
    }

    async fn send(&self, _chat_id: &str, message: OutgoingMessage) -> Result<String, BotError> {
        println!("[BOT] {}", Self::render(&message));
        Ok(uuid::Uuid::new_v4().to_string())
    }

    async fn trigger_typing(&self, _chat_id: &str) -> Result<(), BotError> {
        println!("[BOT is typing...]");
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
    fn renders_every_part() {
        let message = OutgoingMessage::embed(Embed::new().title("Trends"))
            .with_content("top")
            .with_button(LinkButton::new("Open", "https://twitter.com"));
        let text = ConsoleAdapter::render(&message);
        assert!(text.starts_with("top\n"));
        assert!(text.contains("**Trends**"));
        assert!(text.ends_with("[Open] https://twitter.com"));

        let file = OutgoingMessage::file(Attachment::new("/tmp/x.mp4", "crabrave.mp4"));
        assert_eq!(ConsoleAdapter::render(&file), "[file crabrave.mp4] /tmp/x.mp4");
    }
}
