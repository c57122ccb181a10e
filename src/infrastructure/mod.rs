//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Storage / Database: key-value persistence (JSON file, SQLite)
//! - Adapters: Platform integrations (Discord, console)
//! - Media: yt-dlp, ffmpeg and plain HTTP downloads
//! - Twitter: the social-media HTTP API

pub mod adapters;
pub mod config;
pub mod database;
pub mod media;
pub mod storage;
pub mod twitter;
