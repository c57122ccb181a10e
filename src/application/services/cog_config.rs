//! Namespaced JSON documents on top of the key-value store

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::application::errors::StorageError;
use crate::domain::traits::Store;

/// Scope a config document belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Global,
    Channel(String),
    User(String),
}

impl Scope {
    fn path(&self) -> String {
        match self {
            Scope::Global => "global".to_string(),
            Scope::Channel(id) => format!("channel/{}", id),
            Scope::User(id) => format!("user/{}", id),
        }
    }
}

/// Config handle for one cog; keys look like `<cog>/<scope>/<field>`
#[derive(Clone)]
pub struct CogConfig {
    store: Arc<dyn Store>,
    namespace: String,
}

impl CogConfig {
    pub fn new(store: Arc<dyn Store>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    fn key(&self, scope: &Scope, field: &str) -> String {
        format!("{}/{}/{}", self.namespace, scope.path(), field)
    }

    pub async fn get<T: DeserializeOwned>(&self, scope: &Scope, field: &str) -> Result<Option<T>, StorageError> {
        match self.store.get(&self.key(scope, field)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn get_or_default<T: DeserializeOwned + Default>(&self, scope: &Scope, field: &str) -> Result<T, StorageError> {
        Ok(self.get(scope, field).await?.unwrap_or_default())
    }

    pub async fn set<T: Serialize + ?Sized>(&self, scope: &Scope, field: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)?;
        self.store.set(&self.key(scope, field), &raw).await
    }

    pub async fn clear(&self, scope: &Scope, field: &str) -> Result<(), StorageError> {
        self.store.delete(&self.key(scope, field)).await
    }

    /// Remove every field stored for `scope`
    pub async fn clear_scope(&self, scope: &Scope) -> Result<(), StorageError> {
        let prefix = format!("{}/{}/", self.namespace, scope.path());
        for key in self.store.keys(&prefix).await? {
            self.store.delete(&key).await?;
        }
        Ok(())
    }

    /// Ids of every channel that has `field` set
    pub async fn channels_with(&self, field: &str) -> Result<Vec<String>, StorageError> {
        let prefix = format!("{}/channel/", self.namespace);
        let suffix = format!("/{}", field);
        let keys = self.store.keys(&prefix).await?;
        Ok(keys
            .iter()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|rest| rest.strip_suffix(&suffix))
            .filter(|id| !id.contains('/'))
            .map(|id| id.to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::JsonStore;

    #[tokio::test]
    async fn scoped_round_trip_and_channel_listing() {
        let store: Arc<dyn Store> = Arc::new(JsonStore::in_memory());
        let config = CogConfig::new(store.clone(), "Tweets");

        config.set(&Scope::Channel("1".into()), "follows", &vec!["a"]).await.unwrap();
        config.set(&Scope::Channel("2".into()), "follows", &vec!["b"]).await.unwrap();
        config.set(&Scope::Channel("2".into()), "other", &1).await.unwrap();
        config.set(&Scope::Global, "schema_version", &1).await.unwrap();

        let mut channels = config.channels_with("follows").await.unwrap();
        channels.sort();
        assert_eq!(channels, vec!["1", "2"]);

        let version: u32 = config.get_or_default(&Scope::Global, "schema_version").await.unwrap();
        assert_eq!(version, 1);
        assert_eq!(store.get("Tweets/global/schema_version").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn clear_scope_only_touches_that_scope() {
        let store: Arc<dyn Store> = Arc::new(JsonStore::in_memory());
        let config = CogConfig::new(store, "Tweets");
        config.set(&Scope::User("5".into()), "tokens", &"x").await.unwrap();
        config.set(&Scope::User("5".into()), "pending", &"y").await.unwrap();
        config.set(&Scope::User("50".into()), "tokens", &"z").await.unwrap();

        config.clear_scope(&Scope::User("5".into())).await.unwrap();
        assert_eq!(config.get::<String>(&Scope::User("5".into()), "tokens").await.unwrap(), None);
        assert_eq!(config.get::<String>(&Scope::User("5".into()), "pending").await.unwrap(), None);
        assert_eq!(
            config.get::<String>(&Scope::User("50".into()), "tokens").await.unwrap().as_deref(),
            Some("z")
        );
    }
}
