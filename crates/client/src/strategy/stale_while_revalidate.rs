use snipcache_core::{Error, Partition};
use std::sync::Arc;
use tokio::sync::oneshot;

use super::{Served, StrategyExecutor, should_store, store_or_log};
use crate::Request;

impl StrategyExecutor {
    /// Serve the stored copy immediately and refresh it in the background.
    ///
    /// The refresh is always started. With nothing stored, the caller waits
    /// for that same refresh instead of issuing a second fetch. A failed
    /// refresh is logged and leaves the partition untouched.
    pub async fn stale_while_revalidate(&self, request: &Request, partition: &Partition) -> Result<Served, Error> {
        let key = request.key();
        let cached = partition.match_request(&key).await;

        let (tx, rx) = oneshot::channel();
        let network = Arc::clone(&self.network);
        let request_copy = request.clone();
        let target = partition.clone();
        let revalidate_key = key.clone();

        self.spawn_background(async move {
            match network.fetch(&request_copy).await {
                Ok(response) => {
                    let copy = response.clone();
                    // Nobody may be listening; the store still happens.
                    let _ = tx.send(Ok(response));
                    if should_store(&request_copy, &copy) {
                        store_or_log(&target, &revalidate_key, &copy).await;
                    } else {
                        tracing::debug!(key = %revalidate_key, status = copy.status, "revalidated response not cacheable");
                    }
                }
                Err(e) => {
                    tracing::warn!(key = %revalidate_key, error = %e, "failed to update cache");
                    let _ = tx.send(Err(e));
                }
            }
        });

        if let Some(cached) = cached {
            tracing::debug!(partition = partition.name(), key = %key, "serving stale, revalidating");
            return Ok(Served::cache(cached));
        }

        match rx.await {
            Ok(Ok(response)) => Ok(Served::network(response)),
            Ok(Err(e)) => Err(Error::NoResponse(format!("{key}: {e}"))),
            Err(_) => Err(Error::NoResponse(format!("{key}: revalidation was cancelled"))),
        }
    }
}
