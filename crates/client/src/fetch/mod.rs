//! Network access for intercepted requests.
//!
//! ### Network seam
//! - Strategies talk to the network through the [`Network`] trait so tests can
//!   script responses and failures.
//! - [`FetchClient`] is the reqwest-backed implementation.
//!
//! ### Buffering
//! - Bodies are read fully (bounded by `max_bytes`) into `Bytes` and returned
//!   as a [`ResponseSnapshot`]. Nothing downstream ever sees a single-read
//!   stream, so returning and caching the same response cannot conflict.
//!
//! ### Response kind
//! - Same-origin request and final URL: `basic`
//! - Cross-origin with `Access-Control-Allow-Origin`: `cors`
//! - Any other cross-origin response: `opaque`

pub mod error;
pub mod url;

use reqwest::{Client, header};
use snipcache_core::config::ConfigError;
use snipcache_core::{AppConfig, Error, ResponseKind, ResponseSnapshot};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, canonicalize, same_origin};
pub use error::FetchError;

use crate::Request;

/// Anything that can turn a request into a response.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    /// Perform the request. `Err` means no response at all (connection
    /// failure, timeout); HTTP error statuses are returned as `Ok`.
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Origin used to decide whether a response is same-origin.
    pub origin: ::url::Url,

    /// User agent string (default: "snipcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl FetchConfig {
    pub fn new(origin: ::url::Url) -> Self {
        Self {
            origin,
            user_agent: "snipcache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            origin: config.origin_url()?,
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        })
    }
}

/// Classify a response relative to the application origin.
pub fn classify_kind(
    origin: &::url::Url, request_url: &::url::Url, final_url: &::url::Url, headers: &header::HeaderMap,
) -> ResponseKind {
    if same_origin(origin, request_url) && same_origin(origin, final_url) {
        ResponseKind::Basic
    } else if headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN) {
        ResponseKind::Cors
    } else {
        ResponseKind::Opaque
    }
}

/// HTTP fetch client.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| FetchError::Setup(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn send(&self, request: &Request) -> Result<ResponseSnapshot, FetchError> {
        let start = Instant::now();

        let response = self
            .http
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone())
            .send()
            .await?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(FetchError::TooLarge { size: len, limit: self.config.max_bytes });
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;

        if bytes.len() > self.config.max_bytes {
            return Err(FetchError::TooLarge { size: bytes.len() as u64, limit: self.config.max_bytes });
        }

        let kind = classify_kind(&self.config.origin, request.url(), &final_url, &headers);
        let header_pairs = headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        tracing::debug!(
            "fetched {} {} -> {} {} ({}) in {}ms ({} bytes)",
            request.method(),
            request.url(),
            final_url,
            status.as_u16(),
            kind,
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(ResponseSnapshot { url: final_url.to_string(), status: status.as_u16(), kind, headers: header_pairs, body: bytes })
    }
}

#[async_trait::async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, Error> {
        self.send(request).await.map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::url::Url;

    fn origin() -> Url {
        Url::parse("http://localhost:8080").unwrap()
    }

    #[test]
    fn test_fetch_config_defaults() {
        let config = FetchConfig::new(origin());
        assert_eq!(config.user_agent, "snipcache/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { origin: "https://snips.example".into(), timeout_ms: 1500, ..Default::default() };
        let config = FetchConfig::from_app_config(&app).unwrap();
        assert_eq!(config.origin.as_str(), "https://snips.example/");
        assert_eq!(config.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_classify_same_origin_is_basic() {
        let url = origin().join("/app.js").unwrap();
        assert_eq!(classify_kind(&origin(), &url, &url, &header::HeaderMap::new()), ResponseKind::Basic);
    }

    #[test]
    fn test_classify_cross_origin_redirect_is_opaque() {
        let url = origin().join("/avatar.png").unwrap();
        let final_url = Url::parse("https://cdn.example/avatar.png").unwrap();
        assert_eq!(classify_kind(&origin(), &url, &final_url, &header::HeaderMap::new()), ResponseKind::Opaque);
    }

    #[test]
    fn test_classify_cross_origin_with_cors() {
        let url = Url::parse("https://api.example/data").unwrap();
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, header::HeaderValue::from_static("*"));
        assert_eq!(classify_kind(&origin(), &url, &url, &headers), ResponseKind::Cors);
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        let client = FetchClient::new(FetchConfig::new(origin()));
        assert!(client.is_ok());
    }
}
