//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `cache_prefix` contains `-`
    /// - `origin` is not an http(s) URL
    /// - a path setting does not start with `/`
    /// - a static extension is empty
    ///
    /// Returns `ConfigError::Missing` if `cache_version` or `cache_prefix` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.cache_version.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "cache_version".into(),
                hint: "Set SNIPCACHE_CACHE_VERSION to the deployment version".into(),
            });
        }
        if self.cache_prefix.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "cache_prefix".into(),
                hint: "Set SNIPCACHE_CACHE_PREFIX to the application name".into(),
            });
        }

        if self.cache_prefix.contains('-') {
            return Err(ConfigError::Invalid {
                field: "cache_prefix".into(),
                reason: "must not contain '-' (it separates prefix, kind and version)".into(),
            });
        }

        self.origin_url()?;

        for (field, path) in [("offline_page", &self.offline_page), ("api_prefix", &self.api_prefix)] {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must start with '/'".into() });
            }
        }

        if let Some(asset) = self.shell_assets.iter().find(|a| !a.starts_with('/')) {
            return Err(ConfigError::Invalid {
                field: "shell_assets".into(),
                reason: format!("{asset} must be an origin-relative path starting with '/'"),
            });
        }

        if self.static_extensions.iter().any(|ext| ext.trim_start_matches('.').is_empty()) {
            return Err(ConfigError::Invalid { field: "static_extensions".into(), reason: "must not contain empty entries".into() });
        }

        if !self.shell_assets.contains(&self.offline_page) {
            tracing::warn!(
                offline_page = %self.offline_page,
                "offline page is not part of the shell assets; offline navigations will fail until it is cached"
            );
        }

        Ok(())
    }
}
