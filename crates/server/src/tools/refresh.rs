//! refresh tool implementation.
//!
//! Re-checks the deployed version and swaps controllers when it changed.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snipcache_client::{ControllerHost, UpdateOutcome};
use snipcache_core::{AppConfig, Error};

use super::json_result;

/// Parameters for the refresh tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RefreshParams {
    /// Deploy this version instead of the one in the loaded configuration.
    #[serde(default)]
    pub version: Option<String>,
}

/// Output from the refresh tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RefreshOutput {
    /// Version of the controller serving requests after the refresh.
    pub active_version: Option<String>,
    /// True if a new controller installed and claimed all clients.
    pub activated: bool,
    /// Partitions deleted during activation.
    pub pruned: Vec<String>,
}

/// Implementation of the refresh tool.
///
/// Also returns the loaded configuration when a new controller activated
/// with it. When the version was already active the running controller keeps
/// its own settings, so the caller should keep its current view too.
pub async fn refresh_impl(
    host: &ControllerHost, mut config: AppConfig, params: RefreshParams,
) -> Result<(CallToolResult, Option<AppConfig>), McpError> {
    if let Some(version) = params.version {
        config.cache_version = version;
    }
    config.validate().map_err(|e| Error::InvalidInput(e.to_string()))?;

    let outcome = host.update(&config).await?;
    tracing::info!(?outcome, "refresh completed");

    let (activated, pruned) = match outcome {
        UpdateOutcome::UpToDate { .. } => (false, Vec::new()),
        UpdateOutcome::Activated { pruned, .. } => (true, pruned),
    };
    let output = RefreshOutput {
        active_version: host.active().map(|c| c.version().to_string()),
        activated,
        pruned,
    };

    let adopted = activated.then_some(config);
    Ok((json_result(&output)?, adopted))
}
