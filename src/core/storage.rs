//! Key-value storage abstractions

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A named set of byte values.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replaces the value stored under `key`. Durable once this returns.
    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Replaces several values at once. Either all entries are written or
    /// none are.
    async fn put_all(&self, entries: &[(&str, Vec<u8>)]) -> Result<()>;
}

pub trait Store {
    /// Opens the collection called `name`, creating it when missing.
    fn get_collection(&self, name: &str) -> Result<Arc<dyn KeyValueCollection>>;
}
