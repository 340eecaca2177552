//! Test doubles shared by the strategy, router and lifecycle tests.

use snipcache_core::{
    CacheRegistry, CacheStorage, Error, MemoryStorage, RequestKey, ResponseKind, ResponseSnapshot,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use url::Url;

use crate::Request;
use crate::fetch::Network;

pub(crate) const ORIGIN: &str = "http://localhost:8080";

pub(crate) fn origin() -> Url {
    Url::parse(ORIGIN).unwrap()
}

pub(crate) fn url(path: &str) -> String {
    format!("{ORIGIN}{path}")
}

pub(crate) fn get(path: &str) -> Request {
    Request::parse("GET", path, &origin()).unwrap()
}

pub(crate) fn basic(path: &str, body: &str) -> ResponseSnapshot {
    ResponseSnapshot::new(url(path), 200, ResponseKind::Basic)
        .with_header("content-type", "text/plain")
        .with_body(body.to_string())
}

#[derive(Clone)]
enum Reply {
    Respond(ResponseSnapshot),
    Fail,
    Hang,
    Gated(ResponseSnapshot, Arc<Notify>),
}

/// Network double answering from a URL → reply table.
///
/// Unknown URLs fail like an unreachable host.
#[derive(Default)]
pub(crate) struct ScriptedNetwork {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedNetwork {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn respond(&self, path: &str, response: ResponseSnapshot) {
        self.replies.lock().unwrap().insert(url(path), Reply::Respond(response));
    }

    pub(crate) fn fail(&self, path: &str) {
        self.replies.lock().unwrap().insert(url(path), Reply::Fail);
    }

    /// The fetch for `path` never resolves.
    pub(crate) fn hang(&self, path: &str) {
        self.replies.lock().unwrap().insert(url(path), Reply::Hang);
    }

    /// The fetch for `path` answers with `response` once the returned gate
    /// is notified.
    pub(crate) fn gate(&self, path: &str, response: ResponseSnapshot) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.replies
            .lock()
            .unwrap()
            .insert(url(path), Reply::Gated(response, Arc::clone(&gate)));
        gate
    }

    pub(crate) fn go_offline(&self) {
        let mut replies = self.replies.lock().unwrap();
        for reply in replies.values_mut() {
            *reply = Reply::Fail;
        }
    }

    pub(crate) fn calls(&self, path: &str) -> usize {
        let target = url(path);
        self.calls.lock().unwrap().iter().filter(|u| **u == target).count()
    }
}

#[async_trait::async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, Error> {
        let target = request.url().to_string();
        self.calls.lock().unwrap().push(target.clone());
        let reply = self.replies.lock().unwrap().get(&target).cloned();
        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Hang) => std::future::pending::<Result<ResponseSnapshot, Error>>().await,
            Some(Reply::Gated(response, gate)) => {
                gate.notified().await;
                Ok(response)
            }
            Some(Reply::Fail) | None => Err(Error::Network(format!("unreachable: {target}"))),
        }
    }
}

/// Memory storage that counts reads and writes, optionally refusing writes.
#[derive(Default)]
pub(crate) struct CountingStorage {
    inner: MemoryStorage,
    pub(crate) reads: AtomicUsize,
    pub(crate) writes: AtomicUsize,
    reject_writes: std::sync::atomic::AtomicBool,
}

impl CountingStorage {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn reject_writes(&self) {
        self.reject_writes.store(true, Ordering::SeqCst);
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_write(&self) -> Result<(), Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(Error::CorruptEntry("disk full".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CacheStorage for CountingStorage {
    async fn open(&self, partition: &str) -> Result<(), Error> {
        self.inner.open(partition).await
    }

    async fn get(&self, partition: &str, key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(partition, key).await
    }

    async fn put(&self, partition: &str, key: &RequestKey, response: &ResponseSnapshot) -> Result<(), Error> {
        self.check_write()?;
        self.inner.put(partition, key, response).await
    }

    async fn put_all(&self, partition: &str, entries: &[(RequestKey, ResponseSnapshot)]) -> Result<(), Error> {
        self.check_write()?;
        self.inner.put_all(partition, entries).await
    }

    async fn keys(&self, partition: &str) -> Result<Vec<RequestKey>, Error> {
        self.inner.keys(partition).await
    }

    async fn partition_names(&self) -> Result<BTreeSet<String>, Error> {
        self.inner.partition_names().await
    }

    async fn delete(&self, partition: &str) -> Result<bool, Error> {
        self.inner.delete(partition).await
    }
}

pub(crate) fn memory_registry() -> CacheRegistry {
    CacheRegistry::new(Arc::new(MemoryStorage::new()))
}
