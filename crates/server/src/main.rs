//! snipcache server entry point.
//!
//! Boots the MCP server on stdio transport. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use snipcache_client::{ControllerHost, FetchClient, FetchConfig};
use snipcache_core::{AppConfig, CacheDb, CacheRegistry, CacheStorage, MemoryStorage};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!(origin = %config.origin, version = %config.cache_version, "Starting snipcache server on stdio transport");

    let storage: Arc<dyn CacheStorage> = if config.in_memory {
        Arc::new(MemoryStorage::new())
    } else {
        Arc::new(CacheDb::open(&config.db_path).await.context("opening cache database")?)
    };

    let network = FetchClient::new(FetchConfig::from_app_config(&config)?)?;
    let host = Arc::new(ControllerHost::new(CacheRegistry::new(storage), Arc::new(network)));

    match host.update(&config).await {
        Ok(outcome) => tracing::info!(?outcome, "controller ready"),
        Err(e) => tracing::error!(error = %e, "initial install failed; requests go straight to the network"),
    }

    let handler = handler::SnipcacheServer::new(Arc::clone(&host), config);
    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    host.settle().await;

    Ok(())
}
