//! Versioned, partitioned response cache.
//!
//! A partition is a named map from [`RequestKey`] to [`ResponseSnapshot`]
//! (at most one response per key, writes overwrite). Partition names carry
//! the deployment version, so bumping the version and pruning everything
//! else is how old entries are invalidated.
//!
//! - [`CacheStorage`] is the storage contract, injected wherever a cache is needed
//! - [`CacheDb`] stores partitions in SQLite (WAL mode, migrations)
//! - [`MemoryStorage`] keeps them in process memory
//! - [`CacheRegistry`] and [`Partition`] are the handles strategies work with
//!
//! [`ResponseSnapshot`]: crate::ResponseSnapshot

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod partition;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use hash::{RequestKey, compute_cache_key};
pub use memory::MemoryStorage;
pub use partition::{CacheRegistry, Partition, PartitionKind};
pub use storage::CacheStorage;
