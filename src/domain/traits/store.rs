use async_trait::async_trait;
use crate::application::errors::StorageError;

/// Store trait - key-value persistence shared by all cogs
///
/// Keys are `/`-separated paths such as `Tweets/channel/123`; values are JSON documents.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// All keys starting with `prefix`, sorted
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}
