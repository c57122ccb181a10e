use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::domain::entities::{Command, CommandRegistry};

/// Shared handle used by the dispatcher and the cog manager
pub type SharedCommandService = Arc<RwLock<CommandService>>;

/// Names of the commands answered by the service itself
pub const BUILTIN_COMMANDS: [&str; 3] = ["help", "version", "cogs"];

/// Loaded cog as shown by `cogs` and `help <cog>`
#[derive(Debug, Clone)]
pub struct CogInfo {
    pub name: String,
    pub description: String,
    pub version: String,
    pub metadata: BTreeMap<String, String>,
}

/// Service for managing commands and rendering help
pub struct CommandService {
    registry: CommandRegistry,
    cogs: BTreeMap<String, CogInfo>,
    prefix: String,
}

impl CommandService {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            registry: CommandRegistry::new(),
            cogs: BTreeMap::new(),
            prefix: prefix.into(),
        }
    }

    pub fn shared(self) -> SharedCommandService {
        Arc::new(RwLock::new(self))
    }

    pub fn register(&mut self, command: Command) -> bool {
        let name = command.name.clone();
        let added = self.registry.register(command);
        if !added {
            tracing::warn!("Command {} is already registered, skipping", name);
        }
        added
    }

    pub fn register_defaults(&mut self) {
        self.register(Command::new("help")
            .with_description("Show help for a command or cog")
            .with_usage("help [command...]"));

        self.register(Command::new("version")
            .with_description("Show bot version"));

        self.register(Command::new("cogs")
            .with_description("List loaded cogs"));
    }

    pub fn add_cog(&mut self, info: CogInfo, commands: Vec<Command>) {
        for command in commands {
            self.register(command);
        }
        self.cogs.insert(info.name.clone(), info);
    }

    pub fn remove_cog(&mut self, name: &str) {
        self.registry.unregister_cog(name);
        self.cogs.remove(name);
    }

    pub fn cog(&self, name: &str) -> Option<&CogInfo> {
        self.cogs.values().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Resolve a command path, cloning the match out of the registry
    pub fn resolve(&self, path: &[&str]) -> Option<(Command, usize)> {
        self.registry.resolve(path).map(|(cmd, depth)| (cmd.clone(), depth))
    }

    /// Answer a builtin command
    pub fn run_builtin(&self, command: &Command, args: Option<&str>) -> Option<String> {
        match command.name.as_str() {
            "help" => Some(self.get_help(args)),
            "version" => Some(format!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))),
            "cogs" => Some(self.list_cogs()),
            _ => None,
        }
    }

    pub fn list_cogs(&self) -> String {
        if self.cogs.is_empty() {
            return "No cogs loaded.".to_string();
        }
        let mut out = "Loaded cogs:\n".to_string();
        for cog in self.cogs.values() {
            out.push_str(&format!("  {} v{} - {}\n", cog.name, cog.version, cog.description));
        }
        out
    }

    pub fn get_help(&self, query: Option<&str>) -> String {
        if let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) {
            let path: Vec<&str> = query.split_whitespace().collect();
            if let Some((cmd, depth)) = self.registry.resolve(&path) {
                if depth == path.len() {
                    return self.command_help(cmd);
                }
            }
            if let Some(cog) = self.cog(query) {
                return self.cog_help(cog);
            }
            return format!("Command {}{} not found", self.prefix, query);
        }

        // List all commands grouped by cog
        let mut groups: BTreeMap<&str, Vec<&Command>> = BTreeMap::new();
        for cmd in self.registry.all() {
            groups.entry(cmd.cog.as_deref().unwrap_or("Core")).or_default().push(cmd);
        }
        let mut help = "Available commands:\n".to_string();
        for (cog, mut commands) in groups {
            commands.sort_by(|a, b| a.name.cmp(&b.name));
            help.push_str(&format!("{}:\n", cog));
            for cmd in commands {
                help.push_str(&format!("  {}{} - {}\n", self.prefix, cmd.name, cmd.description.as_deref().unwrap_or("")));
            }
        }
        help
    }

    pub fn command_help(&self, cmd: &Command) -> String {
        let mut help = format!(
            "{}{} - {}",
            self.prefix,
            cmd.qualified_name,
            cmd.description.as_deref().unwrap_or("No description")
        );
        if let Some(usage) = &cmd.usage {
            help.push_str(&format!("\nUsage: {}{}", self.prefix, usage));
        }
        if !cmd.aliases.is_empty() {
            help.push_str(&format!("\nAliases: {}", cmd.aliases.join(", ")));
        }
        if cmd.is_group() {
            help.push_str("\nSubcommands:");
            for sub in &cmd.subcommands {
                help.push_str(&format!("\n  {} - {}", sub.name, sub.description.as_deref().unwrap_or("")));
            }
        }
        help
    }

    fn cog_help(&self, cog: &CogInfo) -> String {
        let mut help = format!("{}\n\nCog Version: {}", cog.description, cog.version);
        for (key, value) in &cog.metadata {
            help.push_str(&format!("\n{}: {}", key, value));
        }
        help
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> CommandService {
        let mut service = CommandService::new("!");
        service.register_defaults();
        let mut metadata = BTreeMap::new();
        metadata.insert("yt-dlp Version".to_string(), "2024.01.01".to_string());
        service.add_cog(
            CogInfo {
                name: "CrabRave".into(),
                description: "Create your very own crab rave".into(),
                version: "1.1.3".into(),
                metadata,
            },
            vec![Command::new("crabrave")
                .with_description("Make crab rave videos")
                .with_usage("crabrave <text>")
                .owned_by("CrabRave")],
        );
        service
    }

    #[test]
    fn help_for_command_and_cog() {
        let service = service();
        let help = service.get_help(Some("crabrave"));
        assert!(help.starts_with("!crabrave - Make crab rave videos"));
        assert!(help.contains("Usage: !crabrave <text>"));

        let help = service.get_help(Some("crabrave extra"));
        assert_eq!(help, "Command !crabrave extra not found");

        let help = service.get_help(Some("CrabRave"));
        assert!(help.contains("Cog Version: 1.1.3"));
        assert!(help.contains("yt-dlp Version: 2024.01.01"));
    }

    #[test]
    fn help_lists_commands_by_cog() {
        let help = service().get_help(None);
        assert!(help.contains("CrabRave:\n  !crabrave"));
        assert!(help.contains("Core:\n  !cogs"));
    }

    #[test]
    fn removing_cog_drops_its_commands() {
        let mut service = service();
        service.remove_cog("CrabRave");
        assert!(service.resolve(&["crabrave"]).is_none());
        assert_eq!(service.list_cogs(), "No cogs loaded.");
    }
}
