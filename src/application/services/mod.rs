//! Application services - Business logic orchestration

pub mod api_tokens;
pub mod asset_cache;
pub mod cog_config;
pub mod command_service;
pub mod follow_store;
pub mod roles;

pub use api_tokens::{ApiTokens, ServiceTokens, TOKENS_NAMESPACE};
pub use asset_cache::TemplateCache;
pub use cog_config::{CogConfig, Scope};
pub use command_service::{CogInfo, CommandService, SharedCommandService};
pub use follow_store::{FanOutTarget, FollowStore};
pub use roles::RoleResolver;
