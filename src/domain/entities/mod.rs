//! Domain entities - Core business objects with no external dependencies

pub mod user;
pub mod message;
pub mod command;
pub mod embed;
pub mod follow;
pub mod tweet;
pub mod template;

pub use user::{User, Role};
pub use message::{Message, MessageType, Content, Attachment, LinkButton, OutgoingMessage};
pub use command::{Command, CommandRegistry, BucketType, Cooldown, MaxConcurrency};
pub use embed::Embed;
pub use follow::{ChannelFollows, FollowFlags, FollowOptions, FollowTarget, FollowOutcome, UnfollowOutcome};
pub use tweet::{
    ChannelData, RuleChange, StreamEvent, StreamRule, Trend, TrendLocation, Tweet, TweetEntry,
    TweetKind, TwitterCredentials, TwitterUser, UserTokens,
};
pub use template::{AssetSource, RenderJob, TemplateAsset, TextLayer};
