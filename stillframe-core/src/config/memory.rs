//! In-memory config adapter for tests and database-less runs.

use async_trait::async_trait;
use dashmap::DashMap;

use super::ConfigStore;
use crate::error::Result;

#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    entries: DashMap<String, String>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite a key. The store is read-only through the port; this
    /// is the out-of-band write path operators would otherwise have in SQL.
    pub fn set(&self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }
}
