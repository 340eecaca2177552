//! Request classification.
//!
//! First match wins:
//! 1. `Cache-Control: no-cache` → bypass
//! 2. API prefix → network-first, dynamic
//! 3. snippet paths or JSON `Accept` → stale-while-revalidate, snippets
//! 4. navigations → network-first, dynamic
//! 5. static extensions → cache-first, static
//! 6. anything else → network-first, dynamic
//!
//! A JSON-accepting navigation lands in rule 3, not rule 4.

use serde::Serialize;
use snipcache_core::{AppConfig, PartitionKind};

use crate::Request;
use crate::strategy::Strategy;

/// Outcome of classifying a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum Route {
    /// Go to the network directly; touch no partition.
    Bypass,
    Cached { strategy: Strategy, partition: PartitionKind },
}

impl Route {
    fn cached(strategy: Strategy, partition: PartitionKind) -> Self {
        Route::Cached { strategy, partition }
    }
}

/// Pure classifier built from configuration.
#[derive(Debug, Clone)]
pub struct Router {
    api_prefix: String,
    snippets_marker: String,
    /// Lowercase, each with its leading dot.
    static_suffixes: Vec<String>,
}

impl Router {
    pub fn new(api_prefix: &str, snippets_marker: &str, static_extensions: &[String]) -> Self {
        let static_suffixes = static_extensions
            .iter()
            .map(|ext| format!(".{}", ext.trim_start_matches('.').to_ascii_lowercase()))
            .collect();
        Self { api_prefix: api_prefix.to_string(), snippets_marker: snippets_marker.to_string(), static_suffixes }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.api_prefix, &config.snippets_marker, &config.static_extensions)
    }

    pub fn classify(&self, request: &Request) -> Route {
        if request.wants_fresh() {
            return Route::Bypass;
        }

        let path = request.url().path();

        if path.starts_with(&self.api_prefix) {
            return Route::cached(Strategy::NetworkFirst, PartitionKind::Dynamic);
        }

        if (!self.snippets_marker.is_empty() && path.contains(&self.snippets_marker))
            || request.accepts("application/json")
        {
            return Route::cached(Strategy::StaleWhileRevalidate, PartitionKind::Snippets);
        }

        if request.is_navigation() {
            return Route::cached(Strategy::NetworkFirst, PartitionKind::Dynamic);
        }

        let lower = path.to_ascii_lowercase();
        if self.static_suffixes.iter().any(|suffix| lower.ends_with(suffix.as_str())) {
            return Route::cached(Strategy::CacheFirst, PartitionKind::Static);
        }

        Route::cached(Strategy::NetworkFirst, PartitionKind::Dynamic)
    }
}
