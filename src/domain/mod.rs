//! Domain layer - Core types with no I/O
//!
//! This layer contains:
//! - Entities: Messages, commands, follows, tweets, templates
//! - Traits: Abstractions for infrastructure (Bot, Store, TwitterApi, media tools)

pub mod entities;
pub mod traits;
