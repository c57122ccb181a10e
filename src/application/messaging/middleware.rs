//! Checks run before a command reaches its cog

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::application::errors::CommandError;
use crate::domain::entities::{BucketType, Command, Message, Role};

/// What a check can look at
#[derive(Debug, Clone)]
pub struct Context<'a> {
    pub command: &'a Command,
    pub message: &'a Message,
    pub role: Role,
}

impl<'a> Context<'a> {
    pub fn new(command: &'a Command, message: &'a Message, role: Role) -> Self {
        Self { command, message, role }
    }

    pub fn bucket_key(&self, bucket: BucketType) -> String {
        bucket_key(bucket, self.message)
    }
}

/// Key identifying the bucket `message` falls into
pub fn bucket_key(bucket: BucketType, message: &Message) -> String {
    match bucket {
        BucketType::Default => "global".to_string(),
        BucketType::Guild => message
            .guild_id
            .clone()
            .unwrap_or_else(|| format!("channel:{}", message.chat_id)),
        BucketType::Channel => message.chat_id.clone(),
        BucketType::User => message
            .sender_id()
            .map(|s| s.to_string())
            .unwrap_or_else(|| message.chat_id.clone()),
    }
}

/// A pre-invoke check
pub trait Middleware: Send + Sync {
    fn process(&self, ctx: &Context<'_>) -> Result<(), CommandError>;

    /// Checks that consume something run only once a concurrency permit is held
    fn after_gate(&self) -> bool {
        false
    }
}

/// Rejects callers below the command's required role
pub struct RoleMiddleware;

impl Middleware for RoleMiddleware {
    fn process(&self, ctx: &Context<'_>) -> Result<(), CommandError> {
        if ctx.role.allows(ctx.command.required_role) {
            Ok(())
        } else {
            Err(CommandError::PermissionDenied)
        }
    }
}

/// Per-command cooldown buckets
pub struct CooldownMiddleware {
    requests: Mutex<HashMap<String, Vec<Instant>>>,
}

impl CooldownMiddleware {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
        }
    }

    fn check_at(&self, ctx: &Context<'_>, now: Instant) -> Result<(), CommandError> {
        let Some(cooldown) = ctx.command.cooldown else {
            return Ok(());
        };
        let key = format!("{}:{}", ctx.command.qualified_name, ctx.bucket_key(cooldown.bucket));

        let mut requests = self.requests.lock()
            .map_err(|_| CommandError::ExecutionFailed("Lock poisoned".to_string()))?;

        let times = requests.entry(key).or_default();

        // Remove old requests outside the window
        times.retain(|&t| now.duration_since(t) < cooldown.per);

        if times.len() >= cooldown.rate as usize {
            let retry_after = times.first()
                .map(|t| cooldown.per.saturating_sub(now.duration_since(*t)))
                .unwrap_or(cooldown.per);
            return Err(CommandError::OnCooldown(retry_after));
        }

        times.push(now);
        Ok(())
    }
}

impl Default for CooldownMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for CooldownMiddleware {
    fn process(&self, ctx: &Context<'_>) -> Result<(), CommandError> {
        self.check_at(ctx, Instant::now())
    }

    fn after_gate(&self) -> bool {
        true
    }
}

/// Logs every invocation that reaches the checks
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn process(&self, ctx: &Context<'_>) -> Result<(), CommandError> {
        tracing::debug!(
            "[{}] {} invoked by {} ({})",
            ctx.message.chat_id,
            ctx.command.qualified_name,
            ctx.message.sender_id().unwrap_or("unknown"),
            ctx.role.as_str()
        );
        Ok(())
    }
}

/// Caps how many invocations of a command run at once
///
/// Unlike the other checks this hands back a permit that must live for the whole
/// invocation.
#[derive(Default)]
pub struct ConcurrencyGate {
    semaphores: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl ConcurrencyGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, ctx: &Context<'_>) -> Result<Option<OwnedSemaphorePermit>, CommandError> {
        let Some(limit) = ctx.command.max_concurrency else {
            return Ok(None);
        };
        let key = format!("{}:{}", ctx.command.qualified_name, ctx.bucket_key(limit.bucket));
        let semaphore = {
            let mut semaphores = self.semaphores.lock()
                .map_err(|_| CommandError::ExecutionFailed("Lock poisoned".to_string()))?;
            semaphores
                .entry(key)
                .or_insert_with(|| Arc::new(Semaphore::new(limit.number)))
                .clone()
        };
        semaphore
            .try_acquire_owned()
            .map(Some)
            .map_err(|_| CommandError::MaxConcurrency)
    }
}

/// Human readable retry hint, rounded up to whole seconds
pub fn format_retry(retry_after: Duration) -> String {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    format!("{}s", secs.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crabrave() -> Command {
        Command::new("crabrave")
            .with_cooldown(1, 20, BucketType::Guild)
            .with_max_concurrency(2, BucketType::Default)
    }

    #[test]
    fn cooldown_is_per_guild() {
        let cmd = crabrave();
        let cooldowns = CooldownMiddleware::new();
        let in_a = Message::from_command("c1", "crabrave", "").with_guild("A");
        let in_b = Message::from_command("c2", "crabrave", "").with_guild("B");
        let now = Instant::now();

        assert!(cooldowns.check_at(&Context::new(&cmd, &in_a, Role::Everyone), now).is_ok());
        assert!(cooldowns.check_at(&Context::new(&cmd, &in_b, Role::Everyone), now).is_ok());
        match cooldowns.check_at(&Context::new(&cmd, &in_a, Role::Everyone), now + Duration::from_secs(5)) {
            Err(CommandError::OnCooldown(left)) => assert_eq!(left, Duration::from_secs(15)),
            other => panic!("expected cooldown, got {:?}", other),
        }
        assert!(cooldowns
            .check_at(&Context::new(&cmd, &in_a, Role::Everyone), now + Duration::from_secs(20))
            .is_ok());
    }

    #[test]
    fn direct_messages_fall_back_to_channel_bucket() {
        let msg = Message::from_command("dm-7", "crabrave", "");
        assert_eq!(bucket_key(BucketType::Guild, &msg), "channel:dm-7");
        assert_eq!(bucket_key(BucketType::Default, &msg), "global");
    }

    #[test]
    fn concurrency_gate_releases_on_drop() {
        let cmd = crabrave();
        let gate = ConcurrencyGate::new();
        let msg = Message::from_command("c", "crabrave", "");
        let ctx = Context::new(&cmd, &msg, Role::Everyone);

        let first = gate.acquire(&ctx).unwrap();
        let second = gate.acquire(&ctx).unwrap();
        assert!(first.is_some() && second.is_some());
        assert!(matches!(gate.acquire(&ctx), Err(CommandError::MaxConcurrency)));
        drop(first);
        assert!(gate.acquire(&ctx).is_ok());
    }

    #[test]
    fn only_cooldowns_wait_for_the_gate() {
        assert!(CooldownMiddleware::new().after_gate());
        assert!(!RoleMiddleware.after_gate());
        assert!(!LoggingMiddleware.after_gate());
    }

    #[test]
    fn role_check_blocks_lower_roles() {
        let cmd = Command::new("addrule").with_role(Role::Owner);
        let msg = Message::from_command("c", "addrule", "");
        assert!(RoleMiddleware.process(&Context::new(&cmd, &msg, Role::Admin)).is_err());
        assert!(RoleMiddleware.process(&Context::new(&cmd, &msg, Role::Owner)).is_ok());
    }

    #[test]
    fn retry_rounds_up() {
        assert_eq!(format_retry(Duration::from_millis(14_200)), "15s");
        assert_eq!(format_retry(Duration::from_secs(3)), "3s");
        assert_eq!(format_retry(Duration::ZERO), "1s");
    }
}
