//! Host commands that are not builtins

use async_trait::async_trait;
use std::sync::Arc;

use crate::application::errors::CommandError;
use crate::application::services::{ApiTokens, ServiceTokens};
use crate::domain::entities::{Command, Role};
use crate::domain::traits::Store;
use crate::plugins::trait_def::{Cog, CommandContext};

/// Owner tools such as `set api`
pub struct CoreCog {
    tokens: ApiTokens,
}

impl CoreCog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            tokens: ApiTokens::from_store(store),
        }
    }

    async fn set_api(&self, ctx: &mut CommandContext) -> Result<(), CommandError> {
        let service = ctx.args.next_word().ok_or_else(|| ctx.missing_argument("service"))?;

        let mut tokens = ServiceTokens::new();
        while let Some(key) = ctx.args.next_word() {
            let value = ctx
                .args
                .next_word()
                .ok_or_else(|| CommandError::InvalidArgs(format!("`{}` needs a value.\n{}", key, ctx.usage())))?;
            tokens.insert(key, value);
        }
        if tokens.is_empty() {
            return Err(ctx.missing_argument("key"));
        }

        // Secrets should not stay visible in the channel
        if let Err(e) = ctx.bot.delete_message(ctx.chat_id(), &ctx.message.id).await {
            tracing::debug!("Could not delete set api message: {}", e);
        }

        self.tokens.set(&service, &tokens).await?;
        tracing::info!("API tokens for {} updated ({} keys)", service, tokens.len());
        ctx.say(format!("`{}` API tokens have been set.", service.to_lowercase())).await?;
        Ok(())
    }
}

#[async_trait]
impl Cog for CoreCog {
    fn name(&self) -> &str {
        "Core"
    }

    fn description(&self) -> &str {
        "Bot owner settings"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn commands(&self) -> Vec<Command> {
        vec![Command::new("set")
            .with_description("Change bot settings")
            .with_role(Role::Owner)
            .with_subcommand(
                Command::new("api")
                    .with_description("Set API tokens shared by every cog")
                    .with_role(Role::Owner)
                    .with_usage("set api <service> <key> <value> [<key> <value>...]"),
            )]
    }

    async fn invoke(&self, mut ctx: CommandContext) -> Result<(), CommandError> {
        match ctx.command.qualified_name.as_str() {
            "set api" => self.set_api(&mut ctx).await,
            other => Err(CommandError::NotFound(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::JsonStore;
    use crate::testing::{context, find_command, RecordingBot};

    #[tokio::test]
    async fn set_api_stores_pairs_and_deletes_the_message() {
        let kv: Arc<dyn Store> = Arc::new(JsonStore::in_memory());
        let cog = CoreCog::new(kv.clone());
        let bot = Arc::new(RecordingBot::default());
        let command = find_command(cog.commands(), cog.name(), "set api");
        let ctx = context(bot.clone(), command, "Twitter bearer_token abc client_id xyz", Role::Owner);
        cog.invoke(ctx).await.unwrap();

        let stored = ApiTokens::from_store(kv).get("twitter").await.unwrap();
        assert_eq!(stored["bearer_token"], "abc");
        assert_eq!(stored["client_id"], "xyz");
        assert_eq!(bot.deleted.lock().unwrap().as_slice(), ["1001"]);
        assert_eq!(bot.last_text(), "`twitter` API tokens have been set.");
    }

    #[tokio::test]
    async fn dangling_key_is_rejected() {
        let cog = CoreCog::new(Arc::new(JsonStore::in_memory()));
        let bot = Arc::new(RecordingBot::default());
        let command = find_command(cog.commands(), cog.name(), "set api");
        let err = cog.invoke(context(bot, command, "twitter bearer_token", Role::Owner)).await.unwrap_err();
        assert!(matches!(err, CommandError::InvalidArgs(msg) if msg.starts_with("`bearer_token` needs a value.")));
    }
}
