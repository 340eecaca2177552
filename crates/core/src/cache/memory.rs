//! In-process partition storage.
//!
//! Same contract as the SQLite store but nothing survives the process. Used
//! by tests and by ephemeral deployments (`in_memory = true`).

use super::hash::RequestKey;
use super::storage::CacheStorage;
use crate::Error;
use crate::snapshot::ResponseSnapshot;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

type Entries = BTreeMap<RequestKey, ResponseSnapshot>;

/// Partitions held in a tokio `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    partitions: RwLock<BTreeMap<String, Entries>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, partition: &str) -> Result<(), Error> {
        let mut partitions = self.partitions.write().await;
        partitions.entry(partition.to_string()).or_default();
        Ok(())
    }

    async fn get(&self, partition: &str, key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error> {
        let partitions = self.partitions.read().await;
        Ok(partitions.get(partition).and_then(|entries| entries.get(key)).cloned())
    }

    async fn put(&self, partition: &str, key: &RequestKey, response: &ResponseSnapshot) -> Result<(), Error> {
        let mut partitions = self.partitions.write().await;
        let target = partitions
            .get_mut(partition)
            .ok_or_else(|| Error::UnknownPartition(partition.to_string()))?;
        target.insert(key.clone(), response.clone());
        Ok(())
    }

    async fn put_all(&self, partition: &str, entries: &[(RequestKey, ResponseSnapshot)]) -> Result<(), Error> {
        let mut partitions = self.partitions.write().await;
        let target = partitions
            .get_mut(partition)
            .ok_or_else(|| Error::UnknownPartition(partition.to_string()))?;
        for (key, response) in entries {
            target.insert(key.clone(), response.clone());
        }
        Ok(())
    }

    async fn keys(&self, partition: &str) -> Result<Vec<RequestKey>, Error> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(partition)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn partition_names(&self) -> Result<BTreeSet<String>, Error> {
        let partitions = self.partitions.read().await;
        Ok(partitions.keys().cloned().collect())
    }

    async fn delete(&self, partition: &str) -> Result<bool, Error> {
        let mut partitions = self.partitions.write().await;
        Ok(partitions.remove(partition).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::storage::contract;

    #[tokio::test]
    async fn test_storage_contract() {
        let storage = MemoryStorage::new();
        contract::exercise(&storage).await;
    }
}
