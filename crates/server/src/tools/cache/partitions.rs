//! cache_partitions tool implementation.
//!
//! Lists every partition in the store with the keys it holds.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snipcache_core::{AppConfig, CacheRegistry};

use crate::tools::json_result;

/// Parameters for the cache_partitions tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePartitionsParams {
    /// Only list the current version's partitions.
    #[serde(default)]
    pub current_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PartitionListing {
    pub name: String,
    /// Whether this partition belongs to the configured version.
    pub current: bool,
    /// Stored request keys ("GET <url>").
    pub entries: Vec<String>,
}

/// Output from the cache_partitions tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePartitionsOutput {
    pub version: String,
    pub partitions: Vec<PartitionListing>,
}

/// Implementation of the cache_partitions tool.
pub async fn partitions_impl(
    registry: &CacheRegistry, config: &AppConfig, params: CachePartitionsParams,
) -> Result<CallToolResult, McpError> {
    let current = config.current_partitions();

    let mut partitions = Vec::new();
    for name in registry.partition_names().await? {
        let is_current = current.contains(&name);
        if params.current_only && !is_current {
            continue;
        }
        let entries = registry
            .partition(&name)
            .keys()
            .await?
            .iter()
            .map(ToString::to_string)
            .collect();
        partitions.push(PartitionListing { name, current: is_current, entries });
    }

    json_result(&CachePartitionsOutput { version: config.cache_version.clone(), partitions })
}
