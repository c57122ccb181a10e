//! Message parser - Parses raw messages into structured messages

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::HashMap;

use crate::domain::entities::{Content, Message, MessageType, User};

static MENTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(@!?|@&|#)(\d+)>").expect("mention pattern is valid")
});

static CHANNEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:<#(\d+)>|(\d+))$").expect("channel pattern is valid")
});

/// Parses incoming messages into structured Message objects
pub struct MessageParser {
    command_prefix: String,
}

impl MessageParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            command_prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.command_prefix
    }

    /// Parse a text message
    pub fn parse(&self, chat_id: impl Into<String>, text: impl Into<String>, sender: Option<User>) -> Message {
        let text = text.into();
        let chat_id = chat_id.into();

        if let Some(body) = text.strip_prefix(self.command_prefix.as_str()) {
            if !body.trim().is_empty() {
                return self.parse_command(chat_id, body, sender);
            }
        }

        Message::new(chat_id, Content::Text(text))
            .with_message_type(MessageType::Text)
            .with_sender_opt(sender)
    }

    /// Parse a command message with the prefix already removed
    fn parse_command(&self, chat_id: String, body: &str, sender: Option<User>) -> Message {
        let body = body.trim_start();
        let (name, args) = match body.find(char::is_whitespace) {
            Some(idx) => (&body[..idx], body[idx..].trim()),
            None => (body, ""),
        };

        Message::new(chat_id, Content::Command { name: name.to_string(), args: args.to_string() })
            .with_message_type(MessageType::Command)
            .with_sender_opt(sender)
    }
}

impl Message {
    /// Helper to set sender as Option
    pub fn with_sender_opt(mut self, user: Option<User>) -> Self {
        if let Some(u) = user {
            self.sender = Some(u);
        }
        self
    }

    /// Helper for MessageType
    pub fn with_message_type(mut self, mt: MessageType) -> Self {
        self.message_type = mt;
        self
    }
}

/// Cursor over the arguments of a command
///
/// Words are split on whitespace; a word wrapped in double quotes may contain spaces.
#[derive(Debug, Clone)]
pub struct Arguments {
    raw: String,
    pos: usize,
}

impl Arguments {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into(), pos: 0 }
    }

    fn remaining(&self) -> &str {
        &self.raw[self.pos..]
    }

    pub fn is_empty(&self) -> bool {
        self.remaining().trim().is_empty()
    }

    /// Take the next word
    pub fn next_word(&mut self) -> Option<String> {
        let rest = self.remaining();
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            self.pos = self.raw.len();
            return None;
        }
        let start = self.pos + (rest.len() - trimmed.len());

        if let Some(inner) = trimmed.strip_prefix('"') {
            if let Some(end) = inner.find('"') {
                let word = inner[..end].to_string();
                self.pos = start + 1 + end + 1;
                return Some(word);
            }
        }

        let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        let word = trimmed[..end].to_string();
        self.pos = start + end;
        Some(word)
    }

    /// Look at the next word without consuming it
    pub fn peek_word(&self) -> Option<String> {
        self.clone().next_word()
    }

    /// Take everything left, trimmed; None when nothing is left
    pub fn rest(&mut self) -> Option<String> {
        let rest = self.remaining().trim().to_string();
        self.pos = self.raw.len();
        if rest.is_empty() {
            None
        } else {
            Some(rest)
        }
    }

    /// Skip `n` words
    pub fn skip(&mut self, n: usize) {
        for _ in 0..n {
            if self.next_word().is_none() {
                break;
            }
        }
    }
}

/// Replace raw mentions with readable names and defuse mass pings
pub fn clean_content(text: &str, names: &HashMap<String, String>) -> String {
    let cleaned = MENTION_RE.replace_all(text, |caps: &regex_lite::Captures| {
        let kind = &caps[1];
        let id = &caps[2];
        let name = names.get(id).cloned();
        match kind {
            "#" => format!("#{}", name.unwrap_or_else(|| "deleted-channel".to_string())),
            "@&" => format!("@{}", name.unwrap_or_else(|| "deleted-role".to_string())),
            _ => format!("@{}", name.unwrap_or_else(|| "deleted-user".to_string())),
        }
    });
    cleaned
        .replace("@everyone", "@\u{200b}everyone")
        .replace("@here", "@\u{200b}here")
}

/// Accept `<#id>` or a bare id
pub fn parse_channel(input: &str) -> Option<String> {
    let caps = CHANNEL_RE.captures(input.trim())?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().to_string())
}

pub fn channel_mention(channel_id: &str) -> String {
    format!("<#{}>", channel_id)
}
