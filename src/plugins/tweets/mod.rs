//! Twitter lookups, posting and the filtered stream relay

pub mod auth;
pub mod legacy;
pub mod relay;
pub mod runner;

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::application::errors::{BotError, CommandError, SocialError};
use crate::application::messaging::format::{humanize_number, pagify, truncate};
use crate::application::messaging::parser::{channel_mention, parse_channel, Arguments};
use crate::application::services::{ApiTokens, CogConfig, FollowStore, Scope};
use crate::domain::entities::{
    Command, Embed, FollowFlags, FollowOutcome, FollowTarget, OutgoingMessage, Role,
    TwitterCredentials, TwitterUser, UnfollowOutcome, UserTokens,
};
use crate::domain::traits::{Bot, Store, TwitterApi};
use crate::plugins::trait_def::{Cog, CommandContext};

use auth::{credentials_from, creds_instructions, extract_code, not_authenticated, not_authorized, PendingAuth, SERVICE};
use relay::Relay;
use runner::{StreamRunner, ERROR_CHANNEL_FIELD, ERROR_GUILD_FIELD};

const NAMESPACE: &str = "Tweets";
const TOKENS_FIELD: &str = "tokens";
const PENDING_FIELD: &str = "pending";

const TWEET_LIMIT: usize = 280;
const TRENDS_LIMIT: usize = 5980;
const EMBED_FIELD_LIMIT: usize = 1024;
const EMBED_FIELDS_MAX: usize = 25;
const RECENT_TWEETS: usize = 10;
const DEFAULT_LOCATION: &str = "United States";

/// Runtime knobs for the tweets cog
#[derive(Debug, Clone)]
pub struct TweetsSettings {
    /// Run the filtered stream relay while loaded
    pub stream: bool,
    pub reconnect: Duration,
    pub api_timeout: Duration,
    pub colour: u32,
}

impl Default for TweetsSettings {
    fn default() -> Self {
        Self {
            stream: true,
            reconnect: Duration::from_secs(60),
            api_timeout: Duration::from_secs(10),
            colour: 0x1DA1F2,
        }
    }
}

pub struct TweetsCog {
    api: Arc<dyn TwitterApi>,
    config: CogConfig,
    tokens: ApiTokens,
    follows: Arc<FollowStore>,
    bot: Arc<dyn Bot>,
    settings: TweetsSettings,
    runner: Mutex<Option<JoinHandle<()>>>,
}

impl TweetsCog {
    pub fn new(api: Arc<dyn TwitterApi>, store: Arc<dyn Store>, bot: Arc<dyn Bot>, settings: TweetsSettings) -> Self {
        let config = CogConfig::new(store.clone(), NAMESPACE);
        Self {
            api,
            follows: Arc::new(FollowStore::new(config.clone())),
            tokens: ApiTokens::from_store(store),
            config,
            bot,
            settings,
            runner: Mutex::new(None),
        }
    }

    pub fn follows(&self) -> &Arc<FollowStore> {
        &self.follows
    }

    fn stream_runner(&self) -> StreamRunner {
        StreamRunner::new(
            self.api.clone(),
            self.tokens.clone(),
            self.config.clone(),
            self.bot.clone(),
            Relay::new(self.bot.clone(), self.follows.clone(), self.settings.colour),
            self.settings.reconnect,
        )
    }

    fn stop_runner(&self) {
        if let Ok(mut runner) = self.runner.lock() {
            if let Some(handle) = runner.take() {
                handle.abort();
                tracing::debug!("Twitter stream task stopped");
            }
        }
    }

    /// App credentials, or None after telling the user they are missing
    async fn app_credentials(&self, ctx: &CommandContext) -> Result<Option<TwitterCredentials>, CommandError> {
        let creds = credentials_from(&self.tokens.get(SERVICE).await?);
        if creds.bearer_token.is_empty() {
            ctx.say(not_authenticated(&ctx.prefix)).await?;
            return Ok(None);
        }
        Ok(Some(creds))
    }

    /// The caller's user tokens, or None after asking them to authorize
    async fn user_tokens(&self, ctx: &CommandContext) -> Result<Option<UserTokens>, CommandError> {
        let scope = Scope::User(ctx.author_id().to_string());
        match self.config.get::<UserTokens>(&scope, TOKENS_FIELD).await? {
            Some(tokens) if !tokens.is_expired(Utc::now()) => Ok(Some(tokens)),
            _ => {
                ctx.say(not_authorized(&ctx.prefix)).await?;
                Ok(None)
            }
        }
    }

    /// Run an API call under the configured timeout
    async fn timed<T>(&self, call: impl Future<Output = Result<T, SocialError>>) -> Result<T, SocialError> {
        tokio::time::timeout(self.settings.api_timeout, call)
            .await
            .unwrap_or(Err(SocialError::Timeout))
    }

    /// Tell the user an API call failed
    async fn api_failed(&self, ctx: &CommandContext, what: &str, error: SocialError) -> Result<(), CommandError> {
        tracing::error!("Error {}: {}", what, error);
        let reply = match error {
            SocialError::MissingToken => not_authenticated(&ctx.prefix),
            SocialError::Timeout => format!("Timed out {}.", what),
            other => format!("Something went wrong {}: {}", what, other),
        };
        ctx.say(reply).await?;
        Ok(())
    }

    /// Resolve `username`, or the caller's own account without one
    async fn lookup_user(
        &self,
        ctx: &CommandContext,
        creds: &TwitterCredentials,
        username: Option<&str>,
    ) -> Result<Option<TwitterUser>, CommandError> {
        let found = match username {
            Some(name) => self.timed(self.api.get_user(creds, name)).await,
            None => {
                let Some(tokens) = self.user_tokens(ctx).await? else {
                    return Ok(None);
                };
                self.timed(self.api.get_me(&tokens)).await.map(Some)
            }
        };
        match found {
            Ok(Some(user)) => Ok(Some(user)),
            Ok(None) | Err(SocialError::NotFound(_)) => {
                ctx.say(format!("{} could not be found.", username.unwrap_or("You"))).await?;
                Ok(None)
            }
            Err(e) => {
                self.api_failed(ctx, "looking up that user", e).await?;
                Ok(None)
            }
        }
    }

    async fn forget_me(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        self.config.clear_scope(&Scope::User(ctx.author_id().to_string())).await?;
        ctx.say("Your saved twitter authentication has been deleted.").await?;
        Ok(())
    }

    async fn authorize(&self, ctx: &mut CommandContext) -> Result<(), CommandError> {
        let Some(creds) = self.app_credentials(ctx).await? else {
            return Ok(());
        };
        if creds.client_id.is_none() || creds.redirect_uri.is_none() {
            ctx.say(format!(
                "The bot owner needs to set a Twitter `client_id` and `redirect_uri` first. See `{}tweetset creds`.",
                ctx.prefix
            ))
            .await?;
            return Ok(());
        }
        let scope = Scope::User(ctx.author_id().to_string());

        let Some(input) = ctx.args.rest() else {
            let pending = PendingAuth::new();
            let url = match self.api.authorize_url(&creds, &pending.state, &pending.verifier) {
                Ok(url) => url,
                Err(e) => return self.api_failed(ctx, "building the authorization link", e).await,
            };
            self.config.set(&scope, PENDING_FIELD, &pending).await?;
            ctx.say(format!(
                "Open this link and authorize the bot, then run `{}twitter authorize <code or redirect url>`:\n<{}>",
                ctx.prefix, url
            ))
            .await?;
            return Ok(());
        };

        // The code is a credential; keep it out of the channel where possible
        if let Err(e) = ctx.bot.delete_message(ctx.chat_id(), &ctx.message.id).await {
            tracing::debug!("Could not delete authorize message: {}", e);
        }

        let Some(pending) = self.config.get::<PendingAuth>(&scope, PENDING_FIELD).await? else {
            ctx.say(format!("Run `{}twitter authorize` first to get a link.", ctx.prefix)).await?;
            return Ok(());
        };
        let Some((code, state)) = extract_code(&input) else {
            return Err(ctx.missing_argument("code"));
        };
        if state.is_some_and(|s| s != pending.state) {
            ctx.say(format!(
                "That authorization link has expired. Run `{}twitter authorize` again.",
                ctx.prefix
            ))
            .await?;
            return Ok(());
        }

        match self.timed(self.api.exchange_code(&creds, &code, &pending.verifier)).await {
            Ok(tokens) => {
                self.config.set(&scope, TOKENS_FIELD, &tokens).await?;
                self.config.clear(&scope, PENDING_FIELD).await?;
                ctx.say("Your Twitter account is now authorized.").await?;
                Ok(())
            }
            Err(e) => self.api_failed(ctx, "authorizing your account", e).await,
        }
    }

    async fn send_tweet(&self, ctx: &mut CommandContext) -> Result<(), CommandError> {
        let message = ctx.args.rest().ok_or_else(|| ctx.missing_argument("message"))?;
        if self.app_credentials(ctx).await?.is_none() {
            return Ok(());
        }
        let Some(tokens) = self.user_tokens(ctx).await? else {
            return Ok(());
        };
        match self.timed(self.api.create_tweet(&tokens, &truncate(&message, TWEET_LIMIT))).await {
            Ok(id) => {
                tracing::info!("Tweet {} sent for {}", id, ctx.author_id());
                ctx.say("Tweet sent!").await?;
            }
            Err(e) => {
                tracing::error!("Error sending tweet: {}", e);
                ctx.say("An error has occurred trying to send that tweet.").await?;
            }
        }
        Ok(())
    }

    async fn trends(&self, ctx: &mut CommandContext) -> Result<(), CommandError> {
        let location = ctx.args.rest().unwrap_or_else(|| DEFAULT_LOCATION.to_string());
        let Some(creds) = self.app_credentials(ctx).await? else {
            return Ok(());
        };

        let locations = match self.timed(self.api.available_trends(&creds)).await {
            Ok(locations) => locations,
            Err(SocialError::Timeout) => {
                ctx.say("Timed out getting twitter trends.").await?;
                return Ok(());
            }
            Err(e) => return self.api_failed(ctx, "getting twitter trends", e).await,
        };
        let needle = location.to_lowercase();
        let Some(place) = locations
            .into_iter()
            .filter(|l| l.name.to_lowercase().contains(&needle))
            .last()
        else {
            ctx.say(format!("{} Is not a correct location!", location)).await?;
            return Ok(());
        };

        let trends = match self.timed(self.api.place_trends(&creds, place.woeid)).await {
            Ok(trends) => trends,
            Err(SocialError::Timeout) => {
                ctx.say("Timed out getting twitter trends.").await?;
                return Ok(());
            }
            Err(e) => return self.api_failed(ctx, "getting twitter trends", e).await,
        };

        let mut list = String::new();
        for (i, trend) in trends.iter().enumerate() {
            list.push_str(&format!("{}. [{}]({})", i + 1, trend.name, trend.url));
            if let Some(volume) = trend.tweet_volume {
                list.push_str(&format!(" Volume: {}", humanize_number(volume)));
            }
            list.push('\n');
        }

        let mut embed = Embed::new()
            .title(&place.name)
            .colour(self.settings.colour)
            .timestamp(Utc::now());
        for (i, page) in pagify(&truncate(&list, TRENDS_LIMIT), EMBED_FIELD_LIMIT).into_iter().enumerate() {
            embed = if i == 0 {
                embed.description(page)
            } else {
                embed.field("Trends (continued)", page, false)
            };
        }
        ctx.send(OutgoingMessage::embed(embed)).await?;
        Ok(())
    }

    async fn user(&self, ctx: &mut CommandContext) -> Result<(), CommandError> {
        let username = ctx.args.next_word();
        let Some(creds) = self.app_credentials(ctx).await? else {
            return Ok(());
        };
        let Some(user) = self.lookup_user(ctx, &creds, username.as_deref()).await? else {
            return Ok(());
        };

        let profile_url = user.profile_url();
        let mut embed = Embed::new()
            .url(&profile_url)
            .description(&user.description)
            .colour(self.settings.colour)
            .author(&user.name, Some(profile_url.clone()), user.profile_image_url.clone())
            .field("Followers", humanize_number(user.followers_count), true)
            .field("Following", humanize_number(user.following_count), true);
        if let Some(image) = &user.profile_image_url {
            embed = embed.thumbnail(image);
        }
        if user.verified {
            embed = embed.field("Verified", "Yes", true);
        }
        if let Some(created) = user.created_at {
            embed = embed.footer("Created at").timestamp(created);
        }
        ctx.send(OutgoingMessage::embed(embed).with_content(format!("<{}>", profile_url)))
            .await?;
        Ok(())
    }

    async fn tweets(&self, ctx: &mut CommandContext) -> Result<(), CommandError> {
        let username = ctx.args.next_word();
        ctx.typing().await;
        let Some(creds) = self.app_credentials(ctx).await? else {
            return Ok(());
        };
        let Some(user) = self.lookup_user(ctx, &creds, username.as_deref()).await? else {
            return Ok(());
        };

        let tweets = match self.timed(self.api.user_tweets(&creds, &user, RECENT_TWEETS)).await {
            Ok(tweets) => tweets,
            Err(e) => return self.api_failed(ctx, "getting tweets", e).await,
        };
        if tweets.is_empty() {
            ctx.say(format!("@{} has no tweets to show.", user.username)).await?;
            return Ok(());
        }

        let mut embed = Embed::new()
            .title(format!("Tweets from @{}", user.username))
            .url(user.profile_url())
            .colour(self.settings.colour);
        if let Some(image) = &user.profile_image_url {
            embed = embed.thumbnail(image);
        }
        for tweet in &tweets {
            let name = tweet
                .created_at
                .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| format!("Tweet {}", tweet.id));
            let value = format!("{}\n[Open]({})", truncate(&tweet.text, 900), tweet.url());
            embed = embed.field(name, value, false);
        }
        ctx.send(OutgoingMessage::embed(embed)).await?;
        Ok(())
    }

    async fn follow(&self, ctx: &mut CommandContext) -> Result<(), CommandError> {
        let channel = channel_arg(ctx)?;
        let username = ctx.args.next_word().ok_or_else(|| ctx.missing_argument("username"))?;
        let flags = parse_flags(&mut ctx.args)?;
        let Some(creds) = self.app_credentials(ctx).await? else {
            return Ok(());
        };
        let user = match self.timed(self.api.get_user(&creds, &username)).await {
            Ok(Some(user)) => user,
            Ok(None) | Err(SocialError::NotFound(_)) => {
                ctx.say(format!("I could not find a user named `{}`.", username)).await?;
                return Ok(());
            }
            Err(e) => return self.api_failed(ctx, "looking up that user", e).await,
        };

        let target = FollowTarget::Account(user.id.clone());
        let outcome = self.follow_target(ctx, &channel, &target, flags).await?;
        let reply = match outcome {
            FollowOutcome::Added => format!("Following tweets from {} in {}.", user.username, channel_mention(&channel)),
            FollowOutcome::Updated if !flags.is_empty() => format!(
                "Updated how tweets from {} are posted in {}.",
                user.username,
                channel_mention(&channel)
            ),
            FollowOutcome::Updated => format!(
                "I am already following {} in {}.",
                user.username,
                channel_mention(&channel)
            ),
        };
        ctx.say(reply).await?;
        Ok(())
    }

    async fn follow_target(
        &self,
        ctx: &CommandContext,
        channel: &str,
        target: &FollowTarget,
        flags: FollowFlags,
    ) -> Result<FollowOutcome, CommandError> {
        let options = if flags.is_empty() {
            None
        } else {
            let current = self.follows.channel(channel).await?;
            let base = current.targets(target).get(target.key()).copied().unwrap_or_default();
            Some(flags.apply(base))
        };
        Ok(self.follows.follow(channel, ctx.guild_id(), target, options).await?)
    }

    async fn unfollow(&self, ctx: &mut CommandContext) -> Result<(), CommandError> {
        let channel = channel_arg(ctx)?;
        let username = ctx.args.next_word().ok_or_else(|| ctx.missing_argument("username"))?;
        let Some(creds) = self.app_credentials(ctx).await? else {
            return Ok(());
        };
        let user = match self.timed(self.api.get_user(&creds, &username)).await {
            Ok(Some(user)) => user,
            Ok(None) | Err(SocialError::NotFound(_)) => {
                ctx.say(format!("I could not find a user named `{}`.", username)).await?;
                return Ok(());
            }
            Err(e) => return self.api_failed(ctx, "looking up that user", e).await,
        };

        let reply = match self.follows.unfollow(&channel, &FollowTarget::Account(user.id.clone())).await? {
            UnfollowOutcome::Removed => format!("Unfollowing tweets from {} in {}.", user.username, channel_mention(&channel)),
            UnfollowOutcome::NotFollowed => format!(
                "Tweets from {} are not being followed in {}",
                user.username,
                channel_mention(&channel)
            ),
        };
        ctx.say(reply).await?;
        Ok(())
    }

    async fn follow_rule(&self, ctx: &mut CommandContext) -> Result<(), CommandError> {
        let channel = channel_arg(ctx)?;
        let tag = ctx.args.next_word().ok_or_else(|| ctx.missing_argument("rule_tag"))?;
        let flags = parse_flags(&mut ctx.args)?;
        self.follow_target(ctx, &channel, &FollowTarget::Rule(tag.clone()), flags).await?;
        ctx.say(format!("Following tweets from {} in {}.", tag, channel_mention(&channel))).await?;
        Ok(())
    }

    async fn unfollow_rule(&self, ctx: &mut CommandContext) -> Result<(), CommandError> {
        let channel = channel_arg(ctx)?;
        let tag = ctx.args.next_word().ok_or_else(|| ctx.missing_argument("rule_tag"))?;
        let reply = match self.follows.unfollow(&channel, &FollowTarget::Rule(tag.clone())).await? {
            UnfollowOutcome::Removed => format!("Unfollowing tweets from {} in {}.", tag, channel_mention(&channel)),
            UnfollowOutcome::NotFollowed => {
                format!("Tweets from {} are not being followed in {}", tag, channel_mention(&channel))
            }
        };
        ctx.say(reply).await?;
        Ok(())
    }

    async fn buttons(&self, ctx: &mut CommandContext) -> Result<(), CommandError> {
        let channel = channel_arg(ctx)?;
        let enabled = self.follows.toggle_buttons(&channel, ctx.guild_id()).await?;
        let state = if enabled { "enabled" } else { "disabled" };
        ctx.say(format!(
            "Like, retweet, and reply buttons {} in {}.",
            state,
            channel_mention(&channel)
        ))
        .await?;
        Ok(())
    }

    async fn rules(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let Some(creds) = self.app_credentials(ctx).await? else {
            return Ok(());
        };
        let rules = match self.timed(self.api.get_rules(&creds)).await {
            Ok(rules) => rules,
            Err(e) => return self.api_failed(ctx, "getting stream rules", e).await,
        };
        if rules.is_empty() {
            ctx.say("No rules have been created yet.").await?;
            return Ok(());
        }
        for chunk in rules.chunks(EMBED_FIELDS_MAX) {
            let mut embed = Embed::new().title("Stream rules").colour(self.settings.colour);
            for rule in chunk {
                embed = embed.field(rule.label(), truncate(&rule.value, EMBED_FIELD_LIMIT), false);
            }
            ctx.send(OutgoingMessage::embed(embed)).await?;
        }
        Ok(())
    }

    async fn add_rule(&self, ctx: &mut CommandContext) -> Result<(), CommandError> {
        let tag = ctx.args.next_word().ok_or_else(|| ctx.missing_argument("tag"))?;
        let rule = ctx.args.rest().ok_or_else(|| ctx.missing_argument("rule"))?;
        let Some(creds) = self.app_credentials(ctx).await? else {
            return Ok(());
        };
        match self.timed(self.api.add_rule(&creds, &tag, &rule)).await {
            Ok(change) if change.is_ok() => {
                ctx.say("Rule created successfully.").await?;
                Ok(())
            }
            Ok(change) => {
                ctx.say(format!("There was an issue with that rule.\n{}", change.errors.join("\n"))).await?;
                Ok(())
            }
            Err(e) => self.api_failed(ctx, "creating that rule", e).await,
        }
    }

    async fn delete_rule(&self, ctx: &mut CommandContext) -> Result<(), CommandError> {
        let tag_or_id = ctx.args.next_word().ok_or_else(|| ctx.missing_argument("tag_or_id"))?;
        let Some(creds) = self.app_credentials(ctx).await? else {
            return Ok(());
        };
        let rules = match self.timed(self.api.get_rules(&creds)).await {
            Ok(rules) => rules,
            Err(e) => return self.api_failed(ctx, "getting stream rules", e).await,
        };

        let mut response = String::new();
        for rule in rules
            .iter()
            .filter(|r| r.id == tag_or_id || r.tag.as_deref() == Some(tag_or_id.as_str()))
        {
            match self.timed(self.api.delete_rules(&creds, std::slice::from_ref(&rule.id))).await {
                Ok(change) if change.is_ok() => response.push_str(&format!("Rule {} deleted.\n", rule.label())),
                Ok(change) => {
                    response.push_str("There was an issue with that rule.\n");
                    for error in change.errors {
                        response.push_str(&error);
                        response.push('\n');
                    }
                }
                Err(e) => {
                    tracing::error!("Error deleting rule {}: {}", rule.id, e);
                    response.push_str(&format!("Could not delete rule {}: {}\n", rule.label(), e));
                }
            }
        }
        if response.is_empty() {
            response = format!("No rule matching `{}` was found.", tag_or_id);
        }
        ctx.say(response.trim_end()).await?;
        Ok(())
    }

    async fn errors(&self, ctx: &mut CommandContext) -> Result<(), CommandError> {
        let Some(word) = ctx.args.next_word() else {
            self.config.clear(&Scope::Global, ERROR_CHANNEL_FIELD).await?;
            self.config.clear(&Scope::Global, ERROR_GUILD_FIELD).await?;
            ctx.say("Stream errors will no longer be posted.").await?;
            return Ok(());
        };
        let channel = parse_channel(&word)
            .ok_or_else(|| CommandError::InvalidArgs(format!("`{}` is not a channel.", word)))?;
        self.config.set(&Scope::Global, ERROR_CHANNEL_FIELD, &channel).await?;
        match ctx.guild_id() {
            Some(guild) => self.config.set(&Scope::Global, ERROR_GUILD_FIELD, guild).await?,
            None => self.config.clear(&Scope::Global, ERROR_GUILD_FIELD).await?,
        }
        ctx.say(format!("Stream errors will be posted in {}.", channel_mention(&channel))).await?;
        Ok(())
    }

    async fn creds(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let embed = Embed::new()
            .title("Twitter API tokens")
            .description(creds_instructions(&ctx.prefix))
            .colour(self.settings.colour);
        ctx.send(OutgoingMessage::embed(embed)).await?;
        Ok(())
    }
}

/// Next word as a channel mention or id
fn channel_arg(ctx: &mut CommandContext) -> Result<String, CommandError> {
    let word = ctx.args.next_word().ok_or_else(|| ctx.missing_argument("channel"))?;
    parse_channel(&word).ok_or_else(|| CommandError::InvalidArgs(format!("`{}` is not a channel.", word)))
}

/// `--replies`, `--no-replies`, `--retweets`, `--no-retweets`, `--plain` and `--embed`
pub fn parse_flags(args: &mut Arguments) -> Result<FollowFlags, CommandError> {
    let mut flags = FollowFlags::default();
    while let Some(word) = args.next_word() {
        match word.to_lowercase().as_str() {
            "--replies" => flags.replies = Some(true),
            "--no-replies" => flags.replies = Some(false),
            "--retweets" => flags.retweets = Some(true),
            "--no-retweets" => flags.retweets = Some(false),
            "--embed" | "--embeds" => flags.embeds = Some(true),
            "--plain" => flags.embeds = Some(false),
            _ => return Err(CommandError::InvalidArgs(format!("Unknown option `{}`.", word))),
        }
    }
    Ok(flags)
}

#[async_trait]
impl Cog for TweetsCog {
    fn name(&self) -> &str {
        "Tweets"
    }

    fn description(&self) -> &str {
        "Cog for displaying info from Twitter's API"
    }

    fn version(&self) -> &str {
        "3.0.0"
    }

    fn commands(&self) -> Vec<Command> {
        let mod_only = |cmd: Command| cmd.with_role(Role::Moderator);
        let owner_only = |cmd: Command| cmd.with_role(Role::Owner);

        let stream = Command::new("stream")
            .with_description("Controls for the twitter stream")
            .with_subcommand(mod_only(
                Command::new("follow")
                    .with_description("Follow a twitter user in a channel")
                    .with_usage("twitter stream follow <channel> <username> [--replies|--no-replies] [--retweets|--no-retweets] [--plain|--embed]"),
            ))
            .with_subcommand(mod_only(
                Command::new("unfollow")
                    .with_description("Stop following a twitter user in a channel")
                    .with_usage("twitter stream unfollow <channel> <username>"),
            ))
            .with_subcommand(mod_only(
                Command::new("followrule")
                    .with_description("Post every tweet matching a stream rule in a channel")
                    .with_usage("twitter stream followrule <channel> <rule_tag>"),
            ))
            .with_subcommand(mod_only(
                Command::new("unfollowrule")
                    .with_description("Stop posting tweets matching a stream rule in a channel")
                    .with_usage("twitter stream unfollowrule <channel> <rule_tag>"),
            ))
            .with_subcommand(mod_only(
                Command::new("buttons")
                    .with_description("Toggle like, retweet, and reply buttons in a channel")
                    .with_usage("twitter stream buttons <channel>"),
            ))
            .with_subcommand(Command::new("rules").with_description("List the current stream rules"))
            .with_subcommand(owner_only(
                Command::new("addrule")
                    .with_description("Create a stream rule")
                    .with_usage("twitter stream addrule <tag> <rule...>"),
            ))
            .with_subcommand(owner_only(
                Command::new("delrule")
                    .with_description("Delete a stream rule by tag or id")
                    .with_aliases(&["deleterule", "remrule"])
                    .with_usage("twitter stream delrule <tag_or_id>"),
            ))
            .with_subcommand(owner_only(
                Command::new("errors")
                    .with_description("Set or clear the channel stream errors are posted in")
                    .with_usage("twitter stream errors [channel]"),
            ));

        let twitter = Command::new("twitter")
            .with_description("Gets various information from Twitter's API")
            .with_aliases(&["tweets", "tw"])
            .with_subcommand(Command::new("forgetme").with_description("Delete your saved authentication data"))
            .with_subcommand(
                Command::new("authorize")
                    .with_description("Link your Twitter account")
                    .with_usage("twitter authorize [code or redirect url]"),
            )
            .with_subcommand(
                Command::new("send")
                    .with_description("Send a tweet from your account")
                    .with_usage("twitter send <message...>"),
            )
            .with_subcommand(
                Command::new("trends")
                    .with_description("Twitter trends for a location, default United States")
                    .with_usage("twitter trends [location...]"),
            )
            .with_subcommand(
                Command::new("user")
                    .with_description("Get info about a user")
                    .with_aliases(&["getuser"])
                    .with_usage("twitter user [username]"),
            )
            .with_subcommand(
                Command::new("tweets")
                    .with_description("Show a user's recent tweets")
                    .with_aliases(&["gettweets", "status"])
                    .with_usage("twitter tweets [username]"),
            )
            .with_subcommand(stream);

        let tweetset = Command::new("tweetset")
            .with_description("Settings for the Twitter API")
            .with_role(Role::Admin)
            .with_subcommand(owner_only(
                Command::new("creds").with_description("How to get and set your twitter API tokens"),
            ));

        vec![twitter, tweetset]
    }

    async fn invoke(&self, mut ctx: CommandContext) -> Result<(), CommandError> {
        let name = ctx.command.qualified_name.clone();
        match name.as_str() {
            "twitter forgetme" => self.forget_me(&ctx).await,
            "twitter authorize" => self.authorize(&mut ctx).await,
            "twitter send" => self.send_tweet(&mut ctx).await,
            "twitter trends" => self.trends(&mut ctx).await,
            "twitter user" => self.user(&mut ctx).await,
            "twitter tweets" => self.tweets(&mut ctx).await,
            "twitter stream follow" => self.follow(&mut ctx).await,
            "twitter stream unfollow" => self.unfollow(&mut ctx).await,
            "twitter stream followrule" => self.follow_rule(&mut ctx).await,
            "twitter stream unfollowrule" => self.unfollow_rule(&mut ctx).await,
            "twitter stream buttons" => self.buttons(&mut ctx).await,
            "twitter stream rules" => self.rules(&ctx).await,
            "twitter stream addrule" => self.add_rule(&mut ctx).await,
            "twitter stream delrule" => self.delete_rule(&mut ctx).await,
            "twitter stream errors" => self.errors(&mut ctx).await,
            "tweetset creds" => self.creds(&ctx).await,
            other => Err(CommandError::NotFound(other.to_string())),
        }
    }

    async fn on_load(&self) -> Result<(), BotError> {
        legacy::migrate(&self.config, &self.follows).await?;
        if self.settings.stream {
            let runner = Arc::new(self.stream_runner());
            let handle = tokio::spawn(runner.run());
            if let Ok(mut slot) = self.runner.lock() {
                if let Some(old) = slot.replace(handle) {
                    old.abort();
                }
            }
            tracing::info!("Twitter stream task started");
        }
        Ok(())
    }

    async fn on_unload(&self) {
        self.stop_runner();
    }

    async fn delete_user_data(&self, user_id: &str) -> Result<(), BotError> {
        self.config.clear_scope(&Scope::User(user_id.to_string())).await?;
        Ok(())
    }

    async fn metadata(&self) -> BTreeMap<String, String> {
        let mut meta = BTreeMap::new();
        let running = self
            .runner
            .lock()
            .map(|r| r.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false);
        meta.insert("Stream".to_string(), if running { "running" } else { "stopped" }.to_string());
        meta
    }
}

impl Drop for TweetsCog {
    fn drop(&mut self) {
        self.stop_runner();
    }
}
