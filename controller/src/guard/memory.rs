use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::guard::repository::KvRepository;

/// Process-local store for tests and ephemeral runs.
#[derive(Default)]
pub struct InMemoryKvRepository {
    map: Mutex<HashMap<String, String>>,
}

impl InMemoryKvRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test convenience: current contents without going through the trait.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.map.lock().clone()
    }
}

#[async_trait]
impl KvRepository for InMemoryKvRepository {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.map.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.map.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.map.lock().remove(key);
        Ok(())
    }
}
