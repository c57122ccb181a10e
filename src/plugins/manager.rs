//! Cog manager - handles cog lifecycle

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::application::errors::BotError;
use crate::application::services::{CogInfo, SharedCommandService};
use crate::plugins::trait_def::Cog;

/// Owns the loaded cogs and keeps the command registry in sync with them
pub struct CogManager {
    cogs: RwLock<BTreeMap<String, Arc<dyn Cog>>>,
    commands: SharedCommandService,
}

impl CogManager {
    pub fn new(commands: SharedCommandService) -> Self {
        Self {
            cogs: RwLock::new(BTreeMap::new()),
            commands,
        }
    }

    pub fn commands(&self) -> &SharedCommandService {
        &self.commands
    }

    /// Load a cog and register its commands
    pub async fn load(&self, cog: Arc<dyn Cog>) -> Result<(), BotError> {
        let name = cog.name().to_string();
        if self.get(&name).is_some() {
            return Err(BotError::Cog(format!("Cog '{}' already loaded", name)));
        }

        cog.on_load().await?;

        let info = CogInfo {
            name: name.clone(),
            description: cog.description().to_string(),
            version: cog.version().to_string(),
            metadata: cog.metadata().await,
        };
        let commands = cog.commands().into_iter().map(|c| c.owned_by(&name)).collect();
        self.commands
            .write()
            .map_err(|_| BotError::Cog("command registry lock poisoned".to_string()))?
            .add_cog(info, commands);
        self.cogs
            .write()
            .map_err(|_| BotError::Cog("cog table lock poisoned".to_string()))?
            .insert(name.clone(), cog);

        info!("Loaded cog: {}", name);
        Ok(())
    }

    /// Unload a cog, dropping its commands
    pub async fn unload(&self, name: &str) -> Result<(), BotError> {
        let removed = self
            .cogs
            .write()
            .map_err(|_| BotError::Cog("cog table lock poisoned".to_string()))?
            .remove(name);
        let Some(cog) = removed else {
            return Err(BotError::NotFound(format!("Cog '{}' not loaded", name)));
        };

        if let Ok(mut commands) = self.commands.write() {
            commands.remove_cog(name);
        }
        cog.on_unload().await;
        info!("Unloaded cog: {}", name);
        Ok(())
    }

    pub async fn unload_all(&self) {
        for name in self.names() {
            if let Err(e) = self.unload(&name).await {
                warn!("Failed to unload {}: {}", name, e);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Cog>> {
        self.cogs.read().ok()?.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.cogs
            .read()
            .map(|cogs| cogs.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Ask every cog to forget `user_id`; returns the cogs that failed
    pub async fn delete_user_data(&self, user_id: &str) -> Vec<String> {
        let cogs: Vec<Arc<dyn Cog>> = self
            .cogs
            .read()
            .map(|cogs| cogs.values().cloned().collect())
            .unwrap_or_default();

        let mut failed = Vec::new();
        for cog in cogs {
            if let Err(e) = cog.delete_user_data(user_id).await {
                warn!("{} failed to delete data for {}: {}", cog.name(), user_id, e);
                failed.push(cog.name().to_string());
            }
        }
        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::CommandError;
    use crate::application::services::CommandService;
    use crate::domain::entities::Command;
    use crate::plugins::trait_def::CommandContext;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Dummy {
        unloaded: AtomicBool,
    }

    #[async_trait]
    impl Cog for Dummy {
        fn name(&self) -> &str {
            "Dummy"
        }

        fn description(&self) -> &str {
            "Does nothing"
        }

        fn version(&self) -> &str {
            "0.1.0"
        }

        fn commands(&self) -> Vec<Command> {
            vec![Command::new("grp").with_subcommand(Command::new("sub"))]
        }

        async fn invoke(&self, _ctx: CommandContext) -> Result<(), CommandError> {
            Ok(())
        }

        async fn on_unload(&self) {
            self.unloaded.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn load_registers_commands_and_unload_removes_them() {
        let commands = CommandService::new("!").shared();
        let manager = CogManager::new(commands.clone());
        let cog = Arc::new(Dummy { unloaded: AtomicBool::new(false) });

        manager.load(cog.clone()).await.unwrap();
        assert!(manager.load(cog.clone()).await.is_err());
        {
            let service = commands.read().unwrap();
            let (cmd, depth) = service.resolve(&["grp", "sub"]).unwrap();
            assert_eq!(depth, 2);
            assert_eq!(cmd.qualified_name, "grp sub");
            assert_eq!(cmd.cog.as_deref(), Some("Dummy"));
            assert_eq!(service.cog("dummy").map(|c| c.version.as_str()), Some("0.1.0"));
        }

        manager.unload("Dummy").await.unwrap();
        assert!(cog.unloaded.load(Ordering::SeqCst));
        assert!(commands.read().unwrap().resolve(&["grp"]).is_none());
        assert!(matches!(manager.unload("Dummy").await, Err(BotError::NotFound(_))));
    }
}
