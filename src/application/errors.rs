//! Application layer errors

use std::time::Duration;
use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Cog error: {0}")]
    Cog(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Command execution errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("On cooldown, retry after {0:?}")]
    OnCooldown(Duration),

    #[error("Max concurrency reached")]
    MaxConcurrency,

    #[error(transparent)]
    Bot(Box<BotError>),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<BotError> for CommandError {
    fn from(e: BotError) -> Self {
        CommandError::Bot(Box::new(e))
    }
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Lock poisoned")]
    Poisoned,
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Errors from the social-media API
#[derive(Error, Debug)]
pub enum SocialError {
    #[error("API tokens are not set")]
    MissingToken,

    #[error("Request timed out")]
    Timeout,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<reqwest::Error> for SocialError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SocialError::Timeout
        } else if e.is_decode() {
            SocialError::Parse(e.to_string())
        } else {
            SocialError::Network(e.to_string())
        }
    }
}

/// Errors from external media tools and downloads
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Failed to start {tool}: {reason}")]
    Spawn { tool: String, reason: String },

    #[error("{tool} exited with {status}: {stderr}")]
    Failed { tool: String, status: String, stderr: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
