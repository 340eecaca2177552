//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SNIPCACHE_*)
//! 2. TOML config file (if SNIPCACHE_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The deployment version lives here too: `cache_version` is the only lever
//! for invalidating everything a previous deployment cached.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::PartitionKind;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SNIPCACHE_*)
/// 2. TOML config file (if SNIPCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via SNIPCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Keep partitions in process memory instead of SQLite.
    #[serde(default)]
    pub in_memory: bool,

    /// Origin of the application; same-origin responses are the only
    /// cacheable ones and shell asset paths resolve against it.
    ///
    /// Set via SNIPCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Application prefix of every partition name.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Deployment version tag. Changing it invalidates all prior partitions
    /// on the next activation.
    ///
    /// Set via SNIPCACHE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Paths fetched into the static partition at install.
    #[serde(default = "default_shell_assets")]
    pub shell_assets: Vec<String>,

    /// Document served to HTML requests when offline with no cached match.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// Path prefix routed network-first as API traffic.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Path fragment that marks snippet data.
    #[serde(default = "default_snippets_marker")]
    pub snippets_marker: String,

    /// File extensions served cache-first from the static partition.
    #[serde(default = "default_static_extensions")]
    pub static_extensions: Vec<String>,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via SNIPCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to buffer per response.
    ///
    /// Set via SNIPCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via SNIPCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects to follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./snipcache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_cache_prefix() -> String {
    "snipmaster".into()
}

fn default_cache_version() -> String {
    "v2".into()
}

fn default_shell_assets() -> Vec<String> {
    ["/", "/index.html", "/styles/main.css", "/scripts/app.js", "/offline.html"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_offline_page() -> String {
    "/offline.html".into()
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_snippets_marker() -> String {
    "snippets".into()
}

fn default_static_extensions() -> Vec<String> {
    ["js", "css", "png", "jpg", "svg", "ico"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_user_agent() -> String {
    "snipcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            in_memory: false,
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            shell_assets: default_shell_assets(),
            offline_page: default_offline_page(),
            api_prefix: default_api_prefix(),
            snippets_marker: default_snippets_marker(),
            static_extensions: default_static_extensions(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed application origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(url),
            _ => Err(ConfigError::Invalid { field: "origin".into(), reason: "must be an http(s) URL with a host".into() }),
        }
    }

    /// Physical name of a partition for the configured version,
    /// e.g. `snipmaster-static-v2`.
    pub fn partition_name(&self, kind: PartitionKind) -> String {
        format!("{}-{}-{}", self.cache_prefix, kind.as_str(), self.cache_version)
    }

    /// Names of the three partitions that survive activation.
    pub fn current_partitions(&self) -> Vec<String> {
        PartitionKind::ALL.iter().map(|kind| self.partition_name(*kind)).collect()
    }

    /// Layered figment: defaults, optional TOML file, then environment.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SNIPCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("SNIPCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SNIPCACHE_`
    /// 2. TOML file from `SNIPCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment()
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
