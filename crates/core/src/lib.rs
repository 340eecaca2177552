//! Core types and shared functionality for snipcache.
//!
//! This crate provides:
//! - Partitioned response cache with SQLite and in-memory backends
//! - Response snapshots and the cacheability filter
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod snapshot;

pub use cache::{CacheDb, CacheRegistry, CacheStorage, MemoryStorage, Partition, PartitionKind, RequestKey};
pub use config::AppConfig;
pub use error::Error;
pub use filter::is_cacheable;
pub use snapshot::{ResponseKind, ResponseSnapshot};
