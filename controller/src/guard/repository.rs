use anyhow::Result;
use async_trait::async_trait;

/// Durable string key/value storage shared across restarts.
#[async_trait]
pub trait KvRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}
