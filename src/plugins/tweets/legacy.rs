//! One-shot upgrade of the old account list into per-channel follows

use std::collections::BTreeMap;

use crate::application::errors::StorageError;
use crate::application::services::{CogConfig, FollowStore, Scope};
use crate::domain::entities::{FollowOptions, FollowTarget, TweetEntry};

pub const SCHEMA_VERSION: u32 = 1;

const ACCOUNTS_FIELD: &str = "accounts";
const SCHEMA_FIELD: &str = "schema_version";

/// Move legacy `accounts` into channel follows; returns the number of follows written
pub async fn migrate(config: &CogConfig, follows: &FollowStore) -> Result<usize, StorageError> {
    let version: u32 = config.get_or_default(&Scope::Global, SCHEMA_FIELD).await?;
    if version >= SCHEMA_VERSION {
        return Ok(0);
    }

    let accounts: BTreeMap<String, TweetEntry> = config.get_or_default(&Scope::Global, ACCOUNTS_FIELD).await?;
    let mut moved = 0;
    for (key, entry) in &accounts {
        let account_id = if entry.twitter_id.is_empty() { key } else { &entry.twitter_id };
        let target = FollowTarget::Account(account_id.clone());
        for (channel_id, data) in &entry.channels {
            let options = FollowOptions {
                replies: data.replies,
                retweets: data.retweets,
                embeds: data.embeds,
            };
            let guild = Some(data.guild.as_str()).filter(|g| !g.is_empty());
            follows.follow(channel_id, guild, &target, Some(options)).await?;
            moved += 1;
        }
        tracing::debug!("Migrated {} ({})", entry.twitter_name, account_id);
    }

    config.clear(&Scope::Global, ACCOUNTS_FIELD).await?;
    config.set(&Scope::Global, SCHEMA_FIELD, &SCHEMA_VERSION).await?;
    if moved > 0 {
        tracing::info!("Migrated {} legacy Twitter follows", moved);
    }
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::traits::Store;
    use crate::infrastructure::storage::JsonStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn converts_accounts_once() {
        let kv: Arc<dyn Store> = Arc::new(JsonStore::in_memory());
        let config = CogConfig::new(kv.clone(), "Tweets");
        let follows = FollowStore::new(config.clone());
        kv.set(
            "Tweets/global/accounts",
            r#"{"7": {"twitter_id": "7", "twitter_name": "ferris", "last_tweet": 0,
                 "channels": {"100": {"guild": "1", "replies": true, "retweets": false, "embeds": true},
                              "200": {"guild": "1"}}}}"#,
        )
        .await
        .unwrap();

        assert_eq!(migrate(&config, &follows).await.unwrap(), 2);
        let first = follows.channel("100").await.unwrap();
        assert_eq!(first.followed_accounts["7"], FollowOptions { replies: true, retweets: false, embeds: true });
        assert_eq!(first.guild_id.as_deref(), Some("1"));
        assert_eq!(follows.channel("200").await.unwrap().followed_accounts["7"], FollowOptions::default());

        assert!(kv.get("Tweets/global/accounts").await.unwrap().is_none());
        assert_eq!(kv.get("Tweets/global/schema_version").await.unwrap().as_deref(), Some("1"));
        assert_eq!(migrate(&config, &follows).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn fresh_install_only_bumps_the_version() {
        let kv: Arc<dyn Store> = Arc::new(JsonStore::in_memory());
        let config = CogConfig::new(kv.clone(), "Tweets");
        assert_eq!(migrate(&config, &FollowStore::new(config.clone())).await.unwrap(), 0);
        assert_eq!(kv.keys("Tweets/").await.unwrap(), vec!["Tweets/global/schema_version"]);
    }
}
