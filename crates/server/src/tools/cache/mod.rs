//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting cache partitions.

pub mod get;
pub mod partitions;

pub use get::{CacheGetParams, get_impl};
pub use partitions::{CachePartitionsParams, partitions_impl};
