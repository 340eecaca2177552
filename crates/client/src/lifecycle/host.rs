use serde::Serialize;
use snipcache_core::{AppConfig, CacheRegistry, Error};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};

use super::{Controller, ControllerState};
use crate::Request;
use crate::fetch::Network;
use crate::strategy::Served;

/// Result of [`ControllerHost::update`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// The active controller already runs this version.
    UpToDate { version: String },
    /// A new controller installed, activated, and claimed all clients.
    Activated { version: String, pruned: Vec<String> },
}

/// Owns the active controller and swaps it on update.
///
/// Only one install/activate sequence runs at a time. Requests keep flowing
/// to the current controller while a new one installs; the swap happens in a
/// single `watch` send once activation succeeds.
pub struct ControllerHost {
    registry: CacheRegistry,
    network: Arc<dyn Network>,
    active: watch::Sender<Option<Arc<Controller>>>,
    update_lock: Mutex<()>,
}

impl ControllerHost {
    pub fn new(registry: CacheRegistry, network: Arc<dyn Network>) -> Self {
        let (active, _) = watch::channel(None);
        Self { registry, network, active, update_lock: Mutex::new(()) }
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    /// The controller currently serving clients, if any.
    pub fn active(&self) -> Option<Arc<Controller>> {
        self.active.borrow().clone()
    }

    /// Attach a client. It follows whichever controller is active.
    pub fn client(&self) -> Client {
        Client { controller: self.active.subscribe(), network: Arc::clone(&self.network) }
    }

    /// Install and activate a controller for `config`, unconditionally.
    pub async fn register(&self, config: &AppConfig) -> Result<UpdateOutcome, Error> {
        let _guard = self.update_lock.lock().await;
        self.install_and_claim(config).await
    }

    /// Install and activate `config` unless its version is already active.
    pub async fn update(&self, config: &AppConfig) -> Result<UpdateOutcome, Error> {
        let _guard = self.update_lock.lock().await;
        if let Some(current) = self.active()
            && current.version() == config.cache_version
        {
            tracing::debug!(version = %config.cache_version, "controller already up to date");
            return Ok(UpdateOutcome::UpToDate { version: config.cache_version.clone() });
        }
        self.install_and_claim(config).await
    }

    async fn install_and_claim(&self, config: &AppConfig) -> Result<UpdateOutcome, Error> {
        let controller = Arc::new(Controller::new(config, self.registry.clone(), Arc::clone(&self.network))?);
        tracing::info!(controller = controller.id(), version = controller.version(), "installing controller");

        controller.install().await?;
        let pruned = controller.activate().await?;
        self.claim(Arc::clone(&controller));

        Ok(UpdateOutcome::Activated { version: controller.version().to_string(), pruned })
    }

    /// Make `controller` the one every client talks to.
    fn claim(&self, controller: Arc<Controller>) {
        let id = controller.id();
        let previous = self.active.send_replace(Some(controller));
        if let Some(previous) = previous {
            previous.mark_redundant();
            tracing::info!(controller = id, superseded = previous.id(), "claimed clients");
        } else {
            tracing::info!(controller = id, "claimed clients");
        }
    }

    /// Route a request through the active controller.
    ///
    /// With no active controller the request goes to the network untouched.
    pub async fn intercept(&self, request: &Request) -> Result<Served, Error> {
        self.client().fetch(request).await
    }

    /// Wait for the active controller's background cache work.
    pub async fn settle(&self) {
        if let Some(controller) = self.active() {
            controller.settle().await;
        }
    }
}

/// A page-side handle whose requests go through the active controller.
#[derive(Clone)]
pub struct Client {
    controller: watch::Receiver<Option<Arc<Controller>>>,
    network: Arc<dyn Network>,
}

impl Client {
    pub fn controller(&self) -> Option<Arc<Controller>> {
        self.controller.borrow().clone()
    }

    pub fn is_controlled(&self) -> bool {
        self.controller()
            .is_some_and(|c| c.state() == ControllerState::Active)
    }

    /// Send a request through the current controller.
    ///
    /// If the controller was superseded between lookup and handling, the
    /// request is retried once on its replacement.
    pub async fn fetch(&self, request: &Request) -> Result<Served, Error> {
        match self.controller() {
            Some(controller) => self.dispatch(controller, request).await,
            None => Ok(Served::network(self.network.fetch(request).await?)),
        }
    }

    async fn dispatch(&self, controller: Arc<Controller>, request: &Request) -> Result<Served, Error> {
        match controller.handle(request).await {
            Err(Error::NotActive(reason)) => match self.controller() {
                Some(current) if current.id() != controller.id() => {
                    tracing::debug!(from = controller.id(), to = current.id(), "controller replaced mid-request, retrying");
                    current.handle(request).await
                }
                _ => Err(Error::NotActive(reason)),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Source;
    use crate::testing::{ScriptedNetwork, basic, get, memory_registry};

    fn config(version: &str, shell: &[&str]) -> AppConfig {
        AppConfig {
            cache_version: version.into(),
            shell_assets: shell.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_client_without_controller_goes_to_network() {
        let network = ScriptedNetwork::new();
        network.respond("/scripts/app.js", basic("/scripts/app.js", "live"));
        let host = ControllerHost::new(memory_registry(), network.clone());

        let served = host.client().fetch(&get("/scripts/app.js")).await.unwrap();

        assert_eq!(served.source, Source::Network);
        assert!(!host.client().is_controlled());
    }

    #[tokio::test]
    async fn test_clients_are_claimed_by_new_controller() {
        let network = ScriptedNetwork::new();
        network.respond("/styles/main.css", basic("/styles/main.css", "v1 shell"));
        let host = ControllerHost::new(memory_registry(), network.clone());
        let client = host.client();

        host.update(&config("v1", &["/styles/main.css"])).await.unwrap();
        let first = client.controller().unwrap();
        assert_eq!(first.version(), "v1");
        assert!(client.is_controlled());

        network.respond("/styles/main.css", basic("/styles/main.css", "v2 shell"));
        let outcome = host.update(&config("v2", &["/styles/main.css"])).await.unwrap();

        let second = client.controller().unwrap();
        assert_eq!(second.version(), "v2");
        assert_eq!(first.state(), ControllerState::Redundant);
        match outcome {
            UpdateOutcome::Activated { version, pruned } => {
                assert_eq!(version, "v2");
                assert!(pruned.contains(&"snipmaster-static-v1".to_string()));
            }
            other => panic!("expected activation, got {other:?}"),
        }

        let served = client.fetch(&get("/styles/main.css")).await.unwrap();
        assert_eq!(served.source, Source::Cache);
        assert_eq!(served.response.text(), "v2 shell");
    }

    #[tokio::test]
    async fn test_update_same_version_is_noop() {
        let network = ScriptedNetwork::new();
        network.respond("/styles/main.css", basic("/styles/main.css", "shell"));
        let host = ControllerHost::new(memory_registry(), network.clone());

        host.update(&config("v2", &["/styles/main.css"])).await.unwrap();
        let id = host.active().unwrap().id();
        let outcome = host.update(&config("v2", &["/styles/main.css"])).await.unwrap();

        assert_eq!(outcome, UpdateOutcome::UpToDate { version: "v2".into() });
        assert_eq!(host.active().unwrap().id(), id);
        assert_eq!(network.calls("/styles/main.css"), 1);
    }

    #[tokio::test]
    async fn test_failed_update_keeps_previous_controller() {
        let network = ScriptedNetwork::new();
        network.respond("/styles/main.css", basic("/styles/main.css", "v1 shell"));
        let registry = memory_registry();
        let host = ControllerHost::new(registry.clone(), network.clone());
        host.update(&config("v1", &["/styles/main.css"])).await.unwrap();

        network.respond("/a.js", basic("/a.js", "a"));
        network.fail("/b.js");
        network.respond("/c.js", basic("/c.js", "c"));
        let result = host.update(&config("v2", &["/a.js", "/b.js", "/c.js"])).await;

        assert!(matches!(result, Err(Error::InstallFailed(_))));
        let active = host.active().unwrap();
        assert_eq!(active.version(), "v1");
        assert_eq!(active.state(), ControllerState::Active);
        assert!(registry.partition("snipmaster-static-v2").keys().await.unwrap().is_empty());
        assert!(registry.partition_names().await.unwrap().contains("snipmaster-static-v1"));

        let served = host.intercept(&get("/styles/main.css")).await.unwrap();
        assert_eq!(served.response.text(), "v1 shell");
    }

    #[tokio::test]
    async fn test_register_reinstalls_same_version() {
        let network = ScriptedNetwork::new();
        network.respond("/styles/main.css", basic("/styles/main.css", "shell"));
        let host = ControllerHost::new(memory_registry(), network.clone());

        host.register(&config("v2", &["/styles/main.css"])).await.unwrap();
        let outcome = host.register(&config("v2", &["/styles/main.css"])).await.unwrap();

        assert!(matches!(outcome, UpdateOutcome::Activated { pruned, .. } if pruned.is_empty()));
        assert_eq!(network.calls("/styles/main.css"), 2);
    }

    #[tokio::test]
    async fn test_request_on_superseded_controller_is_retried() {
        let network = ScriptedNetwork::new();
        network.respond("/styles/main.css", basic("/styles/main.css", "shell"));
        let host = ControllerHost::new(memory_registry(), network.clone());
        let client = host.client();
        host.update(&config("v1", &["/styles/main.css"])).await.unwrap();
        let stale = client.controller().unwrap();

        host.update(&config("v2", &["/styles/main.css"])).await.unwrap();
        let served = client.dispatch(stale, &get("/styles/main.css")).await.unwrap();

        assert_eq!(served.source, Source::Cache);
        assert_eq!(host.active().unwrap().version(), "v2");
    }

    #[tokio::test]
    async fn test_pending_write_cannot_revive_pruned_partition() {
        let network = ScriptedNetwork::new();
        network.respond("/styles/main.css", basic("/styles/main.css", "shell"));
        let registry = memory_registry();
        let host = ControllerHost::new(registry.clone(), network.clone());
        host.update(&config("v1", &["/styles/main.css"])).await.unwrap();
        let old = host.active().unwrap();

        let gate = network.gate("/about", basic("/about", "about"));
        let client = host.client();
        let in_flight = tokio::spawn(async move { client.fetch(&get("/about").navigation()).await });
        while network.calls("/about") == 0 {
            tokio::task::yield_now().await;
        }

        host.update(&config("v2", &["/styles/main.css"])).await.unwrap();
        gate.notify_one();
        let served = in_flight.await.unwrap().unwrap();
        old.settle().await;

        assert_eq!(served.response.text(), "about");
        let names = registry.partition_names().await.unwrap();
        assert!(!names.contains("snipmaster-dynamic-v1"), "{names:?}");
        assert!(registry.partition("snipmaster-dynamic-v2").keys().await.unwrap().is_empty());
    }
}
