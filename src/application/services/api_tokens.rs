//! Shared API secrets, set once by the owner and read by any cog

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::application::errors::StorageError;
use crate::application::services::cog_config::{CogConfig, Scope};
use crate::domain::traits::Store;

/// Namespace the shared tokens live under
pub const TOKENS_NAMESPACE: &str = "Core";

pub type ServiceTokens = BTreeMap<String, String>;

#[derive(Clone)]
pub struct ApiTokens {
    config: CogConfig,
}

impl ApiTokens {
    pub fn new(config: CogConfig) -> Self {
        Self { config }
    }

    pub fn from_store(store: Arc<dyn Store>) -> Self {
        Self::new(CogConfig::new(store, TOKENS_NAMESPACE))
    }

    fn field(service: &str) -> String {
        format!("api_tokens/{}", service.to_lowercase())
    }

    pub async fn get(&self, service: &str) -> Result<ServiceTokens, StorageError> {
        self.config.get_or_default(&Scope::Global, &Self::field(service)).await
    }

    /// Merge `tokens` into what is stored for `service`; empty values remove a key
    pub async fn set(&self, service: &str, tokens: &ServiceTokens) -> Result<(), StorageError> {
        let mut current = self.get(service).await?;
        for (key, value) in tokens {
            if value.is_empty() {
                current.remove(key);
            } else {
                current.insert(key.clone(), value.clone());
            }
        }
        self.config.set(&Scope::Global, &Self::field(service), &current).await
    }

    /// Seed values that are not stored yet
    pub async fn seed(&self, service: &str, tokens: &ServiceTokens) -> Result<(), StorageError> {
        let mut current = self.get(service).await?;
        let mut changed = false;
        for (key, value) in tokens {
            if !value.is_empty() && !current.contains_key(key) {
                current.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        if changed {
            self.config.set(&Scope::Global, &Self::field(service), &current).await?;
        }
        Ok(())
    }

    pub async fn clear(&self, service: &str) -> Result<(), StorageError> {
        self.config.clear(&Scope::Global, &Self::field(service)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::JsonStore;

    fn tokens(pairs: &[(&str, &str)]) -> ServiceTokens {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn set_merges_and_seed_never_overwrites() {
        let store: Arc<dyn Store> = Arc::new(JsonStore::in_memory());
        let api = ApiTokens::from_store(store);

        api.set("Twitter", &tokens(&[("bearer_token", "abc"), ("client_id", "id")])).await.unwrap();
        api.set("twitter", &tokens(&[("client_id", "")])).await.unwrap();
        api.seed("twitter", &tokens(&[("bearer_token", "env"), ("client_secret", "s")])).await.unwrap();

        let stored = api.get("twitter").await.unwrap();
        assert_eq!(stored, tokens(&[("bearer_token", "abc"), ("client_secret", "s")]));

        api.clear("twitter").await.unwrap();
        assert!(api.get("twitter").await.unwrap().is_empty());
    }
}
