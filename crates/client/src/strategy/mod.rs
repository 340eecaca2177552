//! Retrieval strategies.
//!
//! ### Algorithms
//! - **Cache-first**: serve the stored copy; on a miss fetch and populate.
//! - **Network-first**: fetch and populate; on network failure fall back to
//!   the stored copy, then to the offline document for HTML requests.
//!
//! Both look in the routed partition first and then in every other partition
//! of the lookup set, so an installed shell page answers a navigation.
//! - **Stale-while-revalidate**: serve the stored copy right away and refresh
//!   it in the background; on a miss wait for that same refresh.
//!
//! ### Population
//! - Every write goes through [`is_cacheable`] and is GET-only.
//! - Writes run as background tasks on the executor's `JoinSet`. The caller
//!   never waits on one; [`StrategyExecutor::settle`] waits for all of them.
//! - The response handed to the caller and the one written are separate
//!   clones taken before the write task is spawned.

mod cache_first;
mod network_first;
mod stale_while_revalidate;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use snipcache_core::{Error, Partition, RequestKey, ResponseSnapshot, is_cacheable};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;

use crate::Request;
use crate::fetch::Network;

/// Which algorithm answers a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::CacheFirst => "cache_first",
            Strategy::NetworkFirst => "network_first",
            Strategy::StaleWhileRevalidate => "stale_while_revalidate",
        })
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Network,
    /// The offline fallback document.
    Offline,
}

/// A response together with its origin.
#[derive(Debug, Clone)]
pub struct Served {
    pub response: ResponseSnapshot,
    pub source: Source,
}

impl Served {
    pub fn cache(response: ResponseSnapshot) -> Self {
        Self { response, source: Source::Cache }
    }

    pub fn network(response: ResponseSnapshot) -> Self {
        Self { response, source: Source::Network }
    }

    pub fn offline(response: ResponseSnapshot) -> Self {
        Self { response, source: Source::Offline }
    }
}

/// Location of the offline document served to HTML requests with no
/// network and no cached match.
#[derive(Debug, Clone)]
pub struct OfflineFallback {
    pub partition: Partition,
    pub key: RequestKey,
}

/// Whether a response to `request` may be written to a partition.
fn should_store(request: &Request, response: &ResponseSnapshot) -> bool {
    *request.method() == Method::GET && is_cacheable(Some(response))
}

/// Runs strategies against partitions and owns their background work.
pub struct StrategyExecutor {
    network: Arc<dyn Network>,
    offline: Option<OfflineFallback>,
    /// Searched in order after the routed partition misses.
    lookup: Vec<Partition>,
    background: Mutex<JoinSet<()>>,
}

impl fmt::Debug for StrategyExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyExecutor").field("offline", &self.offline).finish_non_exhaustive()
    }
}

impl StrategyExecutor {
    pub fn new(network: Arc<dyn Network>, offline: Option<OfflineFallback>) -> Self {
        Self { network, offline, lookup: Vec::new(), background: Mutex::new(JoinSet::new()) }
    }

    /// Partitions searched, in order, when the routed partition has no match.
    /// Writes still go to the routed partition only.
    pub fn with_lookup(mut self, partitions: Vec<Partition>) -> Self {
        self.lookup = partitions;
        self
    }

    /// First stored match for `key`: the routed partition, then the lookup set.
    async fn match_any(&self, partition: &Partition, key: &RequestKey) -> Option<ResponseSnapshot> {
        if let Some(found) = partition.match_request(key).await {
            return Some(found);
        }
        for other in self.lookup.iter().filter(|p| p.name() != partition.name()) {
            if let Some(found) = other.match_request(key).await {
                tracing::debug!(routed = partition.name(), found_in = other.name(), key = %key, "matched outside routed partition");
                return Some(found);
            }
        }
        None
    }

    /// Run `strategy` for `request` against `partition`.
    pub async fn execute(&self, strategy: Strategy, request: &Request, partition: &Partition) -> Result<Served, Error> {
        match strategy {
            Strategy::CacheFirst => self.cache_first(request, partition).await,
            Strategy::NetworkFirst => self.network_first(request, partition).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request, partition).await,
        }
    }

    /// Straight to the network. No partition is read or written.
    pub async fn bypass(&self, request: &Request) -> Result<Served, Error> {
        tracing::debug!(url = %request.url(), "bypassing cache");
        let response = self.network.fetch(request).await?;
        Ok(Served::network(response))
    }

    /// Wait until every background write and revalidation has finished.
    pub async fn settle(&self) {
        loop {
            let mut pending = std::mem::take(&mut *self.background.lock().unwrap_or_else(PoisonError::into_inner));
            if pending.is_empty() {
                return;
            }
            while let Some(result) = pending.join_next().await {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "background cache task did not complete");
                }
            }
        }
    }

    fn spawn_background<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.background.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
    }

    /// Store a duplicate of `response` without blocking the caller.
    fn populate(&self, request: &Request, partition: &Partition, response: &ResponseSnapshot) {
        if !should_store(request, response) {
            tracing::debug!(
                url = %request.url(),
                status = response.status,
                kind = %response.kind,
                "response not cacheable, skipping store"
            );
            return;
        }

        let key = request.key();
        let copy = response.clone();
        let partition = partition.clone();
        self.spawn_background(async move {
            store_or_log(&partition, &key, &copy).await;
        });
    }
}

async fn store_or_log(partition: &Partition, key: &RequestKey, response: &ResponseSnapshot) {
    match partition.store(key, response).await {
        Ok(()) => tracing::debug!(partition = partition.name(), key = %key, "stored response"),
        Err(e) => tracing::warn!(partition = partition.name(), key = %key, error = %e, "cache write failed"),
    }
}
