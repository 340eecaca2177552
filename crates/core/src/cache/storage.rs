//! The storage contract behind every partition.

use super::hash::RequestKey;
use crate::Error;
use crate::snapshot::ResponseSnapshot;
use std::collections::BTreeSet;

/// Backing store for named partitions of request/response pairs.
///
/// Implementations must be safe to share across tasks. Concurrent writes to
/// the same key are last-write-wins. A successful `put` or `put_all` is
/// durable when it returns.
#[async_trait::async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the partition if it does not exist yet. Idempotent.
    async fn open(&self, partition: &str) -> Result<(), Error>;

    /// Stored response for `key`, or `None` if the key or partition is absent.
    async fn get(&self, partition: &str, key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error>;

    /// Store a response, replacing any previous one for the same key.
    ///
    /// Fails with `Error::UnknownPartition` if the partition does not exist;
    /// only `open` creates partitions.
    async fn put(&self, partition: &str, key: &RequestKey, response: &ResponseSnapshot) -> Result<(), Error>;

    /// Store a batch atomically: either every entry becomes visible or none does.
    /// Same partition rule as `put`.
    async fn put_all(&self, partition: &str, entries: &[(RequestKey, ResponseSnapshot)]) -> Result<(), Error>;

    /// Keys stored in a partition, in key order.
    async fn keys(&self, partition: &str) -> Result<Vec<RequestKey>, Error>;

    /// Names of every partition that exists.
    async fn partition_names(&self) -> Result<BTreeSet<String>, Error>;

    /// Remove a partition and all of its entries. Returns whether it existed.
    async fn delete(&self, partition: &str) -> Result<bool, Error>;
}
