use crate::core::storage::KeyValueCollection;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory collection, lost when dropped
#[derive(Default)]
pub struct MemoryCollection {
    inner: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueCollection for MemoryCollection {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let values = self.inner.lock().await;
        let value = values.get(key).cloned();
        debug!(key, hit = value.is_some(), "Memory GET");
        Ok(value)
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut values = self.inner.lock().await;
        debug!(key, "Memory PUT");
        values.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn put_all(&self, entries: &[(&str, Vec<u8>)]) -> Result<()> {
        let mut values = self.inner.lock().await;
        debug!(count = entries.len(), "Memory batch PUT");
        for (key, value) in entries {
            values.insert(key.to_string(), value.clone());
        }
        Ok(())
    }
}
