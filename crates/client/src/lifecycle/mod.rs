//! Controller lifecycle: install, activate, intercept.
//!
//! A [`Controller`] is one deployment's instance of the cache layer. It moves
//! through `Installing → Waiting → Active → Redundant`:
//!
//! - **install** fetches every shell asset and writes them to the static
//!   partition in one atomic batch. Any failure makes the controller
//!   redundant before it ever serves a request.
//! - **activate** deletes every partition of this application that is not one
//!   of the three current-version partitions.
//! - **handle** routes an intercepted request and runs its strategy.
//!
//! [`ControllerHost`] sequences these transitions and hands the winner to
//! clients.

mod host;

pub use host::{Client, ControllerHost, UpdateOutcome};

use serde::Serialize;
use snipcache_core::{AppConfig, CacheRegistry, Error, PartitionKind, RequestKey, ResponseSnapshot};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;
use url::Url;

use crate::Request;
use crate::fetch::{Network, canonicalize};
use crate::router::{Route, Router};
use crate::strategy::{OfflineFallback, Served, StrategyExecutor};

static NEXT_CONTROLLER_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerState {
    Installing,
    /// Installed; waiting to activate.
    Waiting,
    Active,
    /// Failed to install/activate, or superseded by a newer controller.
    Redundant,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ControllerState::Installing => "installing",
            ControllerState::Waiting => "waiting",
            ControllerState::Active => "active",
            ControllerState::Redundant => "redundant",
        })
    }
}

/// One deployment's cache controller.
pub struct Controller {
    id: u64,
    version: String,
    prefix: String,
    shell_assets: Vec<Url>,
    names: [String; 3],
    registry: CacheRegistry,
    network: Arc<dyn Network>,
    router: Router,
    executor: StrategyExecutor,
    state: Mutex<ControllerState>,
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Build a controller for the deployment described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if the origin, a shell asset, or the
    /// offline page cannot be resolved.
    pub fn new(config: &AppConfig, registry: CacheRegistry, network: Arc<dyn Network>) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let resolve = |path: &str| canonicalize(path, &origin).map_err(|e| Error::InvalidUrl(format!("{path}: {e}")));

        let shell_assets = config
            .shell_assets
            .iter()
            .map(|path| resolve(path.as_str()))
            .collect::<Result<Vec<_>, _>>()?;

        let names = PartitionKind::ALL.map(|kind| config.partition_name(kind));
        let lookup = names.iter().map(|name| registry.partition(name)).collect();
        let offline = OfflineFallback {
            partition: registry.partition(&config.partition_name(PartitionKind::Static)),
            key: RequestKey::get(resolve(&config.offline_page)?.as_str()),
        };

        Ok(Self {
            id: NEXT_CONTROLLER_ID.fetch_add(1, Ordering::Relaxed),
            version: config.cache_version.clone(),
            prefix: format!("{}-", config.cache_prefix),
            shell_assets,
            names,
            registry,
            network: Arc::clone(&network),
            router: Router::from_config(config),
            executor: StrategyExecutor::new(network, Some(offline)).with_lookup(lookup),
            state: Mutex::new(ControllerState::Installing),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn state(&self) -> ControllerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: ControllerState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::info!(controller = self.id, version = %self.version, from = %*state, to = %next, "controller state change");
        *state = next;
    }

    /// Swap the state only if it currently equals `expected`.
    fn transition(&self, expected: ControllerState, next: ControllerState) -> Result<(), Error> {
        let current = self.state();
        if current != expected {
            return Err(Error::InvalidInput(format!(
                "controller {} cannot go from {current} to {next}",
                self.id
            )));
        }
        self.set_state(next);
        Ok(())
    }

    pub(crate) fn mark_redundant(&self) {
        if self.state() != ControllerState::Redundant {
            self.set_state(ControllerState::Redundant);
        }
    }

    /// Physical partition name for this controller's version.
    pub fn partition_name(&self, kind: PartitionKind) -> &str {
        match kind {
            PartitionKind::Static => &self.names[0],
            PartitionKind::Dynamic => &self.names[1],
            PartitionKind::Snippets => &self.names[2],
        }
    }

    /// Populate the static partition with every shell asset, all or nothing.
    ///
    /// Assets are fetched concurrently and must all come back with a 2xx
    /// status before anything is written. On success the controller moves to
    /// `Waiting` and is eligible to activate at once.
    pub async fn install(&self) -> Result<(), Error> {
        if self.state() != ControllerState::Installing {
            return Err(Error::InvalidInput(format!("controller {} is not installing", self.id)));
        }

        match self.populate_shell().await {
            Ok(count) => {
                tracing::info!(controller = self.id, assets = count, "install completed, skipping wait");
                self.transition(ControllerState::Installing, ControllerState::Waiting)
            }
            Err(e) => {
                tracing::error!(controller = self.id, version = %self.version, error = %e, "install failed");
                self.mark_redundant();
                Err(Error::InstallFailed(e.to_string()))
            }
        }
    }

    async fn populate_shell(&self) -> Result<usize, Error> {
        let partition = self.registry.open(self.partition_name(PartitionKind::Static)).await?;

        let mut fetches = JoinSet::new();
        for (index, url) in self.shell_assets.iter().enumerate() {
            let network = Arc::clone(&self.network);
            let request = Request::get(url.clone());
            fetches.spawn(async move {
                let result = network.fetch(&request).await;
                (index, request, result)
            });
        }

        let mut fetched: Vec<(usize, RequestKey, ResponseSnapshot)> = Vec::with_capacity(self.shell_assets.len());
        while let Some(joined) = fetches.join_next().await {
            let (index, request, result) = joined.map_err(|e| Error::Network(format!("shell fetch aborted: {e}")))?;
            let response = result.map_err(|e| Error::Network(format!("{}: {e}", request.url())))?;
            if !response.is_success() {
                return Err(Error::Network(format!("{}: status {}", request.url(), response.status)));
            }
            fetched.push((index, request.key(), response));
        }
        fetched.sort_by_key(|(index, _, _)| *index);

        let entries: Vec<_> = fetched.into_iter().map(|(_, key, response)| (key, response)).collect();
        partition.store_all(&entries).await?;

        Ok(entries.len())
    }

    /// Delete every stale partition of this application, open the current
    /// ones, and become active.
    ///
    /// Only opened partitions accept writes, so a write still in flight from
    /// a superseded controller cannot bring a pruned partition back. Returns
    /// the names of the deleted partitions. Claiming clients is the host's
    /// job once this returns.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        if self.state() != ControllerState::Waiting {
            return Err(Error::InvalidInput(format!("controller {} is not waiting to activate", self.id)));
        }

        match self.prune_and_open().await {
            Ok(deleted) => {
                self.transition(ControllerState::Waiting, ControllerState::Active)?;
                Ok(deleted)
            }
            Err(e) => {
                tracing::error!(controller = self.id, error = %e, "activation failed");
                self.mark_redundant();
                Err(e)
            }
        }
    }

    async fn prune_and_open(&self) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.registry.partition_names().await? {
            if name.starts_with(&self.prefix) && !self.names.contains(&name) {
                tracing::info!(controller = self.id, partition = %name, "deleting old cache");
                self.registry.delete(&name).await?;
                deleted.push(name);
            }
        }
        for name in &self.names {
            self.registry.open(name).await?;
        }
        Ok(deleted)
    }

    /// Answer an intercepted request. Only an active controller intercepts.
    pub async fn handle(&self, request: &Request) -> Result<Served, Error> {
        let state = self.state();
        if state != ControllerState::Active {
            return Err(Error::NotActive(format!("controller {} is {state}", self.id)));
        }

        let route = self.router.classify(request);
        tracing::debug!(controller = self.id, url = %request.url(), route = ?route, "routing request");

        match route {
            Route::Bypass => self.executor.bypass(request).await,
            Route::Cached { strategy, partition } => {
                let partition = self.registry.partition(self.partition_name(partition));
                self.executor.execute(strategy, request, &partition).await
            }
        }
    }

    /// Wait for this controller's background cache work to finish.
    pub async fn settle(&self) {
        self.executor.settle().await;
    }
}
