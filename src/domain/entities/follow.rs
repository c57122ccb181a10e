use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a followed account or rule is posted in a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowOptions {
    pub replies: bool,
    pub retweets: bool,
    pub embeds: bool,
}

impl Default for FollowOptions {
    fn default() -> Self {
        Self {
            replies: false,
            retweets: true,
            embeds: true,
        }
    }
}

/// Per-setting overrides given on a follow command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FollowFlags {
    pub replies: Option<bool>,
    pub retweets: Option<bool>,
    pub embeds: Option<bool>,
}

impl FollowFlags {
    pub fn is_empty(&self) -> bool {
        self.replies.is_none() && self.retweets.is_none() && self.embeds.is_none()
    }

    /// `base` with every given flag applied
    pub fn apply(&self, base: FollowOptions) -> FollowOptions {
        FollowOptions {
            replies: self.replies.unwrap_or(base.replies),
            retweets: self.retweets.unwrap_or(base.retweets),
            embeds: self.embeds.unwrap_or(base.embeds),
        }
    }
}

/// What a channel follows
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FollowTarget {
    Account(String),
    Rule(String),
}

impl FollowTarget {
    pub fn key(&self) -> &str {
        match self {
            FollowTarget::Account(id) => id,
            FollowTarget::Rule(tag) => tag,
        }
    }
}

/// Per-channel follow configuration as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelFollows {
    pub followed_accounts: BTreeMap<String, FollowOptions>,
    pub followed_rules: BTreeMap<String, FollowOptions>,
    pub guild_id: Option<String>,
    pub add_buttons: bool,
}

impl Default for ChannelFollows {
    fn default() -> Self {
        Self {
            followed_accounts: BTreeMap::new(),
            followed_rules: BTreeMap::new(),
            guild_id: None,
            add_buttons: true,
        }
    }
}

impl ChannelFollows {
    pub fn targets(&self, target: &FollowTarget) -> &BTreeMap<String, FollowOptions> {
        match target {
            FollowTarget::Account(_) => &self.followed_accounts,
            FollowTarget::Rule(_) => &self.followed_rules,
        }
    }

    pub fn targets_mut(&mut self, target: &FollowTarget) -> &mut BTreeMap<String, FollowOptions> {
        match target {
            FollowTarget::Account(_) => &mut self.followed_accounts,
            FollowTarget::Rule(_) => &mut self.followed_rules,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.followed_accounts.is_empty() && self.followed_rules.is_empty()
    }

    /// Options for a tweet by `author_id` matched by `rule_tags`; accounts win over rules
    pub fn options_for(&self, author_id: &str, rule_tags: &[String]) -> Option<FollowOptions> {
        if let Some(options) = self.followed_accounts.get(author_id) {
            return Some(*options);
        }
        rule_tags.iter().find_map(|tag| self.followed_rules.get(tag).copied())
    }
}

/// Result of a follow request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Added,
    Updated,
}

/// Result of an unfollow request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfollowOutcome {
    Removed,
    NotFollowed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_partial_records_with_defaults() {
        let follows: ChannelFollows =
            serde_json::from_str(r#"{"followed_accounts": {"12": {}}}"#).unwrap();
        assert!(follows.add_buttons);
        assert_eq!(follows.followed_accounts["12"], FollowOptions::default());
        assert!(!follows.followed_accounts["12"].replies);
    }

    #[test]
    fn flags_only_touch_what_they_name() {
        let base = FollowOptions { replies: true, retweets: false, embeds: true };
        let flags = FollowFlags { embeds: Some(false), ..Default::default() };
        assert_eq!(flags.apply(base), FollowOptions { replies: true, retweets: false, embeds: false });
        assert!(FollowFlags::default().is_empty());
    }

    #[test]
    fn accounts_take_precedence_over_rules() {
        let mut follows = ChannelFollows::default();
        follows.followed_rules.insert("cats".into(), FollowOptions { embeds: false, ..Default::default() });
        follows.followed_accounts.insert("7".into(), FollowOptions { replies: true, ..Default::default() });

        let tags = vec!["cats".to_string()];
        assert!(follows.options_for("7", &tags).unwrap().replies);
        assert!(!follows.options_for("8", &tags).unwrap().embeds);
        assert!(follows.options_for("8", &[]).is_none());
    }
}
