use crate::core::storage::KeyValueCollection;
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionHandle, PersistMode};
use std::sync::Arc;
use tracing::debug;

/// A collection backed by a fjall partition.
pub struct DiskCollection {
    keyspace: Arc<Keyspace>,
    partition: PartitionHandle,
}

impl DiskCollection {
    pub fn new(keyspace: Arc<Keyspace>, partition: PartitionHandle) -> Self {
        Self {
            keyspace,
            partition,
        }
    }
}

#[async_trait]
impl KeyValueCollection for DiskCollection {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self
            .partition
            .get(key)
            .with_context(|| format!("Failed to read key: {key}"))?
            .map(|slice| slice.to_vec());
        debug!(key, hit = value.is_some(), "Disk GET");
        Ok(value)
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.partition
            .insert(key.as_bytes(), value)
            .with_context(|| format!("Failed to write key: {key}"))?;
        // The journal is only flushed lazily, the process may exit right after
        self.keyspace
            .persist(PersistMode::SyncAll)
            .context("Failed to persist keyspace")?;
        debug!(key, "Disk PUT");
        Ok(())
    }

    async fn put_all(&self, entries: &[(&str, Vec<u8>)]) -> Result<()> {
        let mut batch = self.keyspace.batch();
        for (key, value) in entries {
            batch.insert(&self.partition, key.as_bytes(), value.as_slice());
        }
        batch.commit().context("Failed to commit batch")?;
        self.keyspace
            .persist(PersistMode::SyncAll)
            .context("Failed to persist keyspace")?;
        debug!(count = entries.len(), "Disk batch PUT");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fjall::PartitionCreateOptions;
    use tempfile::tempdir;

    fn open(path: &std::path::Path) -> DiskCollection {
        let keyspace = Arc::new(fjall::Config::new(path).open().unwrap());
        let partition = keyspace
            .open_partition("test", PartitionCreateOptions::default())
            .unwrap();
        DiskCollection::new(keyspace, partition)
    }

    #[tokio::test]
    async fn test_disk_get_put() {
        let dir = tempdir().unwrap();
        let collection = open(dir.path());

        assert!(collection.get("key1").await.unwrap().is_none());

        collection.put("key1", b"123").await.unwrap();
        assert_eq!(collection.get("key1").await.unwrap(), Some(b"123".to_vec()));
        assert!(collection.get("key2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disk_values_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let collection = open(dir.path());
            collection.put("favorites", b"[\"sh600000\"]").await.unwrap();
        }

        let collection = open(dir.path());
        assert_eq!(
            collection.get("favorites").await.unwrap(),
            Some(b"[\"sh600000\"]".to_vec())
        );
    }

    #[tokio::test]
    async fn test_disk_batch_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let collection = open(dir.path());
            collection.put("favorites", b"[]").await.unwrap();
            collection
                .put_all(&[("favorites", b"[\"a\"]".to_vec()), ("holdings", b"[]".to_vec())])
                .await
                .unwrap();
        }

        let collection = open(dir.path());
        assert_eq!(
            collection.get("favorites").await.unwrap(),
            Some(b"[\"a\"]".to_vec())
        );
        assert_eq!(collection.get("holdings").await.unwrap(), Some(b"[]".to_vec()));
    }
}
