//! Message dispatcher - Routes command messages to the owning cog

use std::sync::Arc;

use super::format::{box_text, pagify};
use super::middleware::{format_retry, ConcurrencyGate, Context, Middleware};
use super::parser::{Arguments, MessageParser};
use crate::application::errors::{BotError, CommandError};
use crate::application::services::{RoleResolver, SharedCommandService};
use crate::domain::entities::{Command, Content, Message, User};
use crate::domain::traits::Bot;
use crate::plugins::manager::CogManager;
use crate::plugins::trait_def::CommandContext;

/// Deepest subcommand nesting looked at when resolving a command path
const MAX_COMMAND_DEPTH: usize = 4;

const MESSAGE_LIMIT: usize = 1900;

/// What happened to a dispatched message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Not a command, sent by a bot, or an unknown command
    Ignored,
    /// Answered by a builtin or with group help
    Builtin,
    /// A check refused the invocation
    Rejected,
    /// Handed to a cog
    Invoked,
}

pub struct Dispatcher {
    parser: MessageParser,
    commands: SharedCommandService,
    cogs: Arc<CogManager>,
    middleware: Vec<Arc<dyn Middleware>>,
    gate: ConcurrencyGate,
    roles: RoleResolver,
    bot: Arc<dyn Bot>,
}

impl Dispatcher {
    pub fn new(cogs: Arc<CogManager>, roles: RoleResolver, bot: Arc<dyn Bot>) -> Self {
        let commands = cogs.commands().clone();
        let prefix = commands
            .read()
            .map(|c| c.prefix().to_string())
            .unwrap_or_else(|_| "!".to_string());
        Self {
            parser: MessageParser::new(prefix),
            commands,
            cogs,
            middleware: Vec::new(),
            gate: ConcurrencyGate::new(),
            roles,
            bot,
        }
    }

    /// Add middleware to the chain
    pub fn with_middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn parser(&self) -> &MessageParser {
        &self.parser
    }

    pub fn bot(&self) -> &Arc<dyn Bot> {
        &self.bot
    }

    /// Parse raw text and dispatch it
    pub async fn process_text(
        &self,
        chat_id: &str,
        text: &str,
        sender: Option<User>,
    ) -> Result<Dispatch, BotError> {
        let message = self.parser.parse(chat_id, text, sender);
        self.dispatch(message).await
    }

    /// Route one message through the checks to its cog
    pub async fn dispatch(&self, message: Message) -> Result<Dispatch, BotError> {
        if message.sender.as_ref().is_some_and(|s| s.is_bot) {
            return Ok(Dispatch::Ignored);
        }
        let Content::Command { name, args } = &message.content else {
            return Ok(Dispatch::Ignored);
        };

        let mut args = Arguments::new(args.clone());
        let Some(command) = self.resolve(name, &mut args)? else {
            tracing::debug!("Unknown command {}", name);
            return Ok(Dispatch::Ignored);
        };

        let prefix = self.parser.prefix().to_string();

        if command.cog.is_none() {
            let reply = {
                let commands = self.commands.read().map_err(|_| poisoned())?;
                commands.run_builtin(&command, args.rest().as_deref())
            };
            if let Some(reply) = reply {
                self.reply_paged(&message.chat_id, &reply).await?;
            }
            return Ok(Dispatch::Builtin);
        }

        // A bare group answers with its own help
        if command.is_group() {
            let help = {
                let commands = self.commands.read().map_err(|_| poisoned())?;
                commands.command_help(&command)
            };
            self.reply_paged(&message.chat_id, &help).await?;
            return Ok(Dispatch::Builtin);
        }

        let role = self.roles.role_of(message.sender_id());
        let ctx = Context::new(&command, &message, role);
        let checked = self.check(&ctx, false).and_then(|_| {
            let permit = self.gate.acquire(&ctx)?;
            self.check(&ctx, true)?;
            Ok(permit)
        });
        let permit = match checked {
            Ok(permit) => permit,
            Err(e) => {
                self.report(&message.chat_id, &command, &e).await?;
                return Ok(Dispatch::Rejected);
            }
        };

        let cog_name = command.cog.clone().unwrap_or_default();
        let Some(cog) = self.cogs.get(&cog_name) else {
            tracing::warn!("Command {} belongs to unloaded cog {}", command.qualified_name, cog_name);
            return Ok(Dispatch::Ignored);
        };

        let chat_id = message.chat_id.clone();
        let qualified = command.qualified_name.clone();
        let invocation = CommandContext {
            message,
            command: command.clone(),
            args,
            role,
            prefix,
            bot: self.bot.clone(),
        };
        let result = cog.invoke(invocation).await;
        drop(permit);

        if let Err(e) = result {
            tracing::debug!("{} failed: {}", qualified, e);
            self.report(&chat_id, &command, &e).await?;
        }
        Ok(Dispatch::Invoked)
    }

    /// Run the checks on one side of the concurrency gate
    fn check(&self, ctx: &Context<'_>, after_gate: bool) -> Result<(), CommandError> {
        self.middleware
            .iter()
            .filter(|m| m.after_gate() == after_gate)
            .try_for_each(|m| m.process(ctx))
    }

    /// Look up the command for `name` plus leading words of `args`, consuming the
    /// words that named subcommands
    fn resolve(&self, name: &str, args: &mut Arguments) -> Result<Option<Command>, BotError> {
        let mut path = vec![name.to_string()];
        let mut peek = args.clone();
        while path.len() < MAX_COMMAND_DEPTH {
            match peek.next_word() {
                Some(word) => path.push(word),
                None => break,
            }
        }
        let words: Vec<&str> = path.iter().map(String::as_str).collect();

        let commands = self.commands.read().map_err(|_| poisoned())?;
        Ok(commands.resolve(&words).map(|(command, depth)| {
            args.skip(depth - 1);
            command
        }))
    }

    async fn reply_paged(&self, chat_id: &str, text: &str) -> Result<(), BotError> {
        for page in pagify(text, MESSAGE_LIMIT) {
            self.bot.send_message(chat_id, &box_text(&page)).await?;
        }
        Ok(())
    }

    async fn report(&self, chat_id: &str, command: &Command, error: &CommandError) -> Result<(), BotError> {
        let reply = error_reply(error);
        if matches!(error, CommandError::Bot(_) | CommandError::Storage(_) | CommandError::ExecutionFailed(_)) {
            tracing::error!("Error in command {}: {}", command.qualified_name, error);
        }
        self.bot.send_message(chat_id, &reply).await?;
        Ok(())
    }
}

fn poisoned() -> BotError {
    BotError::Cog("command registry lock poisoned".to_string())
}

/// User-facing text for a failed invocation
pub fn error_reply(error: &CommandError) -> String {
    match error {
        CommandError::PermissionDenied => "You don't have permission to use this command.".to_string(),
        CommandError::OnCooldown(retry) => {
            format!("This command is on cooldown. Try again in {}.", format_retry(*retry))
        }
        CommandError::MaxConcurrency => "Too many people are using this command. Try again later.".to_string(),
        CommandError::InvalidArgs(msg) => msg.clone(),
        other => format!("Error: {}", other),
    }
}
