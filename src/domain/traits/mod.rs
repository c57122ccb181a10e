//! Domain traits - Abstractions for infrastructure implementations

pub mod bot;
pub mod store;
pub mod twitter;
pub mod media;

pub use bot::{Bot, BotInfo};
pub use store::Store;
pub use twitter::{EventStream, TwitterApi};
pub use media::{FileFetcher, VideoDownloader, VideoRenderer};
