//! cache_get tool implementation.
//!
//! Retrieves a stored response from one of the current version's partitions.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snipcache_client::Request;
use snipcache_core::{AppConfig, CacheRegistry, Error, PartitionKind, ResponseKind};
use std::collections::BTreeMap;

use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Logical partition: "static", "dynamic" or "snippets".
    pub partition: PartitionKind,

    /// Absolute URL or origin-relative path of the stored GET request.
    pub url: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    /// Physical partition name, e.g. "snipmaster-static-v2".
    pub partition: String,
    pub key: String,
    pub status: u16,
    pub kind: ResponseKind,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(
    registry: &CacheRegistry, config: &AppConfig, params: CacheGetParams,
) -> Result<CallToolResult, McpError> {
    let origin = config.origin_url().map_err(|e| Error::InvalidInput(e.to_string()))?;
    let key = Request::parse("GET", &params.url, &origin)?.key();
    let name = config.partition_name(params.partition);

    let response = registry
        .partition(&name)
        .match_request(&key)
        .await
        .ok_or_else(|| Error::CacheMiss(format!("{key} in {name}")))?;

    let output = CacheGetOutput {
        partition: name,
        key: key.to_string(),
        status: response.status,
        kind: response.kind,
        content_type: response.content_type().map(str::to_string),
        headers: response.headers.iter().cloned().collect(),
        body: response.text(),
    };

    json_result(&output)
}
