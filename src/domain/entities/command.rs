use std::collections::HashMap;
use std::time::Duration;

use super::Role;

/// Scope a cooldown or concurrency limit is counted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketType {
    /// One bucket shared by every invocation
    Default,
    /// Per guild, falling back to the channel outside guilds
    Guild,
    Channel,
    User,
}

/// `rate` invocations per `per` window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    pub rate: u32,
    pub per: Duration,
    pub bucket: BucketType,
}

impl Cooldown {
    pub fn new(rate: u32, per: Duration, bucket: BucketType) -> Self {
        Self { rate, per, bucket }
    }
}

/// At most `number` invocations running at once per bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxConcurrency {
    pub number: usize,
    pub bucket: BucketType,
}

/// Represents a bot command, possibly a group with subcommands
#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    pub qualified_name: String,
    pub description: Option<String>,
    pub aliases: Vec<String>,
    pub usage: Option<String>,
    pub cog: Option<String>,
    pub required_role: Role,
    pub cooldown: Option<Cooldown>,
    pub max_concurrency: Option<MaxConcurrency>,
    pub subcommands: Vec<Command>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            qualified_name: name.clone(),
            name,
            description: None,
            aliases: Vec::new(),
            usage: None,
            cog: None,
            required_role: Role::Everyone,
            cooldown: None,
            max_concurrency: None,
            subcommands: Vec::new(),
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.required_role = role;
        self
    }

    pub fn with_cooldown(mut self, rate: u32, per_secs: u64, bucket: BucketType) -> Self {
        self.cooldown = Some(Cooldown::new(rate, Duration::from_secs(per_secs), bucket));
        self
    }

    pub fn with_max_concurrency(mut self, number: usize, bucket: BucketType) -> Self {
        self.max_concurrency = Some(MaxConcurrency { number, bucket });
        self
    }

    pub fn with_subcommand(mut self, command: Command) -> Self {
        self.subcommands.push(command);
        self
    }

    /// Tag this command and its whole subtree with the owning cog and full names
    pub fn owned_by(mut self, cog: &str) -> Self {
        self.assign(cog, None);
        self
    }

    fn assign(&mut self, cog: &str, parent: Option<&str>) {
        self.cog = Some(cog.to_string());
        self.qualified_name = match parent {
            Some(parent) => format!("{} {}", parent, self.name),
            None => self.name.clone(),
        };
        let qualified = self.qualified_name.clone();
        for sub in &mut self.subcommands {
            sub.assign(cog, Some(&qualified));
        }
    }

    pub fn is_group(&self) -> bool {
        !self.subcommands.is_empty()
    }

    pub fn matches(&self, input: &str) -> bool {
        let input_lower = input.to_lowercase();
        self.name.to_lowercase() == input_lower ||
            self.aliases.iter().any(|a| a.to_lowercase() == input_lower)
    }

    pub fn find_subcommand(&self, input: &str) -> Option<&Command> {
        self.subcommands.iter().find(|c| c.matches(input))
    }
}

/// Command registry for managing available commands
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a top-level command; returns false if the name is taken
    pub fn register(&mut self, command: Command) -> bool {
        if self.find(&command.name).is_some() {
            return false;
        }
        self.commands.insert(command.name.clone(), command);
        true
    }

    pub fn unregister_cog(&mut self, cog: &str) {
        self.commands.retain(|_, c| c.cog.as_deref() != Some(cog));
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    pub fn find(&self, input: &str) -> Option<&Command> {
        self.commands.values().find(|c| c.matches(input))
    }

    /// Walk `path` down the command tree, returning the deepest match and how many
    /// words of `path` it consumed
    pub fn resolve<'a>(&'a self, path: &[&str]) -> Option<(&'a Command, usize)> {
        let first = path.first()?;
        let mut current = self.find(first)?;
        let mut depth = 1;
        while let Some(word) = path.get(depth) {
            match current.find_subcommand(word) {
                Some(sub) => {
                    current = sub;
                    depth += 1;
                }
                None => break,
            }
        }
        Some((current, depth))
    }

    pub fn all(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn twitter() -> Command {
        Command::new("twitter")
            .with_aliases(&["tweets", "tw"])
            .with_subcommand(Command::new("stream")
                .with_subcommand(Command::new("follow"))
                .with_subcommand(Command::new("delrule").with_aliases(&["remrule"])))
            .with_subcommand(Command::new("user").with_aliases(&["getuser"]))
            .owned_by("Tweets")
    }

    #[test]
    fn resolves_nested_subcommands_through_aliases() {
        let mut registry = CommandRegistry::new();
        registry.register(twitter());

        let (cmd, depth) = registry.resolve(&["tw", "stream", "remrule", "abc"]).unwrap();
        assert_eq!(cmd.qualified_name, "twitter stream delrule");
        assert_eq!(cmd.cog.as_deref(), Some("Tweets"));
        assert_eq!(depth, 3);

        let (cmd, depth) = registry.resolve(&["TWITTER", "getuser", "palm"]).unwrap();
        assert_eq!(cmd.qualified_name, "twitter user");
        assert_eq!(depth, 2);
    }

    #[test]
    fn stops_at_group_when_subcommand_unknown() {
        let mut registry = CommandRegistry::new();
        registry.register(twitter());
        let (cmd, depth) = registry.resolve(&["twitter", "nope"]).unwrap();
        assert_eq!(cmd.name, "twitter");
        assert_eq!(depth, 1);
        assert!(registry.resolve(&["unknown"]).is_none());
    }

    #[test]
    fn rejects_duplicate_names_and_aliases() {
        let mut registry = CommandRegistry::new();
        assert!(registry.register(twitter()));
        assert!(!registry.register(Command::new("tw")));
        registry.unregister_cog("Tweets");
        assert!(registry.is_empty());
    }
}
