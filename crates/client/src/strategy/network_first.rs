use snipcache_core::{Error, Partition};

use super::{Served, StrategyExecutor};
use crate::Request;

impl StrategyExecutor {
    /// Prefer the network; degrade to the stored copy, then to the offline
    /// document for HTML requests.
    ///
    /// Only a failed fetch triggers the fallback. HTTP error statuses are
    /// passed through as-is (and not stored).
    pub async fn network_first(&self, request: &Request, partition: &Partition) -> Result<Served, Error> {
        let fetch_error = match self.network.fetch(request).await {
            Ok(response) => {
                self.populate(request, partition, &response);
                return Ok(Served::network(response));
            }
            Err(e) => e,
        };

        let key = request.key();
        tracing::debug!(partition = partition.name(), key = %key, error = %fetch_error, "network failed, trying cache");

        if let Some(cached) = self.match_any(partition, &key).await {
            return Ok(Served::cache(cached));
        }

        if request.accepts("text/html")
            && let Some(offline) = &self.offline
            && let Some(document) = offline.partition.match_request(&offline.key).await
        {
            tracing::debug!(key = %key, "serving offline document");
            return Ok(Served::offline(document));
        }

        Err(Error::NoResponse(format!("{key}: {fetch_error}")))
    }
}
