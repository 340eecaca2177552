//! fetch tool implementation.
//!
//! Sends one request through the active controller and reports where the
//! answer came from.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snipcache_client::{ControllerHost, Request, Source};
use snipcache_core::{AppConfig, Error, ResponseKind};
use std::collections::BTreeMap;

use super::json_result;

/// Input parameters for the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchParams {
    /// Absolute URL or origin-relative path ("/snippets/42").
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Extra request headers, e.g. `{"accept": "application/json"}` or
    /// `{"cache-control": "no-cache"}`.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Treat the request as a top-level page navigation.
    #[serde(default)]
    pub navigate: bool,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchOutput {
    /// The canonical request URL.
    pub url: String,
    /// The response URL (after redirects, for network responses).
    pub response_url: String,
    pub status: u16,
    pub kind: ResponseKind,
    pub source: Source,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    pub body_bytes: usize,
}

/// Implementation of the fetch tool.
pub async fn fetch_impl(host: &ControllerHost, config: &AppConfig, params: FetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let origin = config.origin_url().map_err(|e| Error::InvalidInput(e.to_string()))?;
    let mut request = Request::parse(&params.method, &params.url, &origin)?;
    for (name, value) in &params.headers {
        request.insert_header(name, value)?;
    }
    request.set_navigation(params.navigate);

    let served = host.intercept(&request).await?;
    let response = served.response;

    let output = FetchOutput {
        url: request.url().to_string(),
        response_url: response.url.clone(),
        status: response.status,
        kind: response.kind,
        source: served.source,
        content_type: response.content_type().map(str::to_string),
        headers: response.headers.iter().cloned().collect(),
        body: response.text(),
        body_bytes: response.body.len(),
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{active_host, config, text};

    fn params(url: &str) -> FetchParams {
        FetchParams { url: url.into(), method: default_method(), headers: BTreeMap::new(), navigate: false }
    }

    #[tokio::test]
    async fn test_fetch_empty_url() {
        let (host, _) = active_host("v1").await;
        let result = fetch_impl(&host, &config("v1"), params("  ")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_serves_installed_shell_from_cache() {
        let (host, network) = active_host("v1").await;
        network.clear();

        let result = fetch_impl(&host, &config("v1"), params("/styles/main.css")).await.unwrap();
        let output: FetchOutput = serde_json::from_str(&text(&result)).unwrap();

        assert_eq!(output.source, Source::Cache);
        assert_eq!(output.body, "body {}");
        assert_eq!(output.url, "http://localhost:8080/styles/main.css");
    }

    #[tokio::test]
    async fn test_fetch_offline_navigation() {
        let (host, network) = active_host("v1").await;
        network.clear();

        let mut p = params("/settings");
        p.navigate = true;
        p.headers.insert("accept".into(), "text/html".into());
        let result = fetch_impl(&host, &config("v1"), p).await.unwrap();
        let output: FetchOutput = serde_json::from_str(&text(&result)).unwrap();

        assert_eq!(output.source, Source::Offline);
        assert_eq!(output.body, "offline");
    }

    #[tokio::test]
    async fn test_fetch_reports_source_in_lowercase() {
        let (host, _) = active_host("v1").await;

        let result = fetch_impl(&host, &config("v1"), params("/styles/main.css")).await.unwrap();
        let raw: serde_json::Value = serde_json::from_str(&text(&result)).unwrap();

        assert_eq!(raw["source"], "cache");
    }

    #[tokio::test]
    async fn test_fetch_no_response_is_error() {
        let (host, _) = active_host("v1").await;
        let result = fetch_impl(&host, &config("v1"), params("/api/missing")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_header() {
        let (host, _) = active_host("v1").await;
        let mut p = params("/styles/main.css");
        p.headers.insert("bad header".into(), "x".into());
        assert!(fetch_impl(&host, &config("v1"), p).await.is_err());
    }
}
