use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{KeyValueStore, StoreResult};

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Raw value, bypassing the async interface (test inspection)
    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.read().get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.inner.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> StoreResult<()> {
        self.inner.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.inner.write().remove(key);
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.inner.write().clear();
        Ok(())
    }
}
