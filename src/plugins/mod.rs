//! Cogs and the machinery that loads them

pub mod manager;
pub mod owner;
pub mod rave;
pub mod trait_def;
pub mod tweets;

pub use manager::CogManager;
pub use owner::CoreCog;
pub use rave::RaveCog;
pub use trait_def::{Cog, CommandContext};
pub use tweets::{TweetsCog, TweetsSettings};
