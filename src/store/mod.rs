pub mod disk;
pub mod memory;

use crate::core::storage::{KeyValueCollection, Store};
use anyhow::{Context, Result, anyhow};
use disk::DiskCollection;
use fjall::{Keyspace, PartitionCreateOptions};
use memory::MemoryCollection;
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, RwLock},
};
use tracing::debug;

/// A thread-safe key-value store that can hold multiple collections.
///
/// Collections live on disk when the store was opened with a keyspace and in
/// memory otherwise.
pub struct KeyValueStore {
    collections: RwLock<HashMap<String, Arc<dyn KeyValueCollection>>>,
    keyspace: Option<Arc<Keyspace>>,
}

impl KeyValueStore {
    /// Opens (or creates) a persistent store under `data_path/state`.
    pub fn open(data_path: &Path) -> Result<Self> {
        let state_dir = data_path.join("state");
        std::fs::create_dir_all(&state_dir)
            .with_context(|| format!("Failed to create directory: {}", state_dir.display()))?;
        let keyspace = fjall::Config::new(&state_dir)
            .open()
            .with_context(|| format!("Failed to open state store: {}", state_dir.display()))?;
        debug!("Opened state store at {}", state_dir.display());

        Ok(Self {
            collections: RwLock::new(HashMap::new()),
            keyspace: Some(Arc::new(keyspace)),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            keyspace: None,
        }
    }
}

impl Store for KeyValueStore {
    fn get_collection(&self, name: &str) -> Result<Arc<dyn KeyValueCollection>> {
        if let Some(collection) = self
            .collections
            .read()
            .map_err(|_| anyhow!("Collection registry poisoned"))?
            .get(name)
        {
            return Ok(Arc::clone(collection));
        }

        let mut collections = self
            .collections
            .write()
            .map_err(|_| anyhow!("Collection registry poisoned"))?;
        if let Some(collection) = collections.get(name) {
            return Ok(Arc::clone(collection));
        }

        let collection: Arc<dyn KeyValueCollection> = match &self.keyspace {
            Some(keyspace) => {
                let partition = keyspace
                    .open_partition(name, PartitionCreateOptions::default())
                    .with_context(|| format!("Failed to open collection: {name}"))?;
                Arc::new(DiskCollection::new(Arc::clone(keyspace), partition))
            }
            None => Arc::new(MemoryCollection::new()),
        };
        collections.insert(name.to_string(), Arc::clone(&collection));
        Ok(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_name_returns_same_collection() {
        let store = KeyValueStore::in_memory();

        let first = store.get_collection("app").unwrap();
        first.put("key", b"value").await.unwrap();

        let second = store.get_collection("app").unwrap();
        assert_eq!(second.get("key").await.unwrap(), Some(b"value".to_vec()));

        let other = store.get_collection("other").unwrap();
        assert!(other.get("key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persistent_store_creates_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyValueStore::open(dir.path()).unwrap();

        let collection = store.get_collection("app").unwrap();
        collection.put("key", b"value").await.unwrap();

        assert!(dir.path().join("state").is_dir());
        assert_eq!(collection.get("key").await.unwrap(), Some(b"value".to_vec()));
    }
}
