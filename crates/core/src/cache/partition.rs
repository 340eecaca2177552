//! Partition handles and the registry that hands them out.

use super::hash::RequestKey;
use super::storage::CacheStorage;
use crate::Error;
use crate::snapshot::ResponseSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// The three logical partitions of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PartitionKind {
    /// Shell and static assets, populated at install.
    Static,
    /// Pages and API responses.
    Dynamic,
    /// Snippet data served stale-while-revalidate.
    Snippets,
}

impl PartitionKind {
    pub const ALL: [PartitionKind; 3] = [PartitionKind::Static, PartitionKind::Dynamic, PartitionKind::Snippets];

    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionKind::Static => "static",
            PartitionKind::Dynamic => "dynamic",
            PartitionKind::Snippets => "snippets",
        }
    }
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to one named partition.
///
/// Reads never fail from the caller's point of view: a storage error is
/// logged and reported as a miss. Writes return their error so the caller
/// can decide to swallow it.
#[derive(Clone)]
pub struct Partition {
    name: Arc<str>,
    storage: Arc<dyn CacheStorage>,
}

impl fmt::Debug for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partition").field("name", &self.name).finish()
    }
}

impl Partition {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stored response for `key`, treating storage failures as a miss.
    pub async fn match_request(&self, key: &RequestKey) -> Option<ResponseSnapshot> {
        match self.storage.get(&self.name, key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(partition = %self.name, key = %key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    pub async fn store(&self, key: &RequestKey, response: &ResponseSnapshot) -> Result<(), Error> {
        self.storage.put(&self.name, key, response).await
    }

    /// Atomic batch write; nothing is visible unless everything is.
    pub async fn store_all(&self, entries: &[(RequestKey, ResponseSnapshot)]) -> Result<(), Error> {
        self.storage.put_all(&self.name, entries).await
    }

    pub async fn keys(&self) -> Result<Vec<RequestKey>, Error> {
        self.storage.keys(&self.name).await
    }
}

/// Entry point to the partition namespace over an injected storage backend.
#[derive(Clone)]
pub struct CacheRegistry {
    storage: Arc<dyn CacheStorage>,
}

impl fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistry").finish_non_exhaustive()
    }
}

impl CacheRegistry {
    pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
        Self { storage }
    }

    /// Open (creating if absent) a partition and return its handle.
    pub async fn open(&self, name: &str) -> Result<Partition, Error> {
        self.storage.open(name).await?;
        Ok(self.partition(name))
    }

    /// Handle to a partition without touching storage.
    ///
    /// Writes through the handle fail until the partition has been opened.
    pub fn partition(&self, name: &str) -> Partition {
        Partition { name: Arc::from(name), storage: Arc::clone(&self.storage) }
    }

    pub async fn partition_names(&self) -> Result<BTreeSet<String>, Error> {
        self.storage.partition_names().await
    }

    pub async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.storage.delete(name).await
    }
}
