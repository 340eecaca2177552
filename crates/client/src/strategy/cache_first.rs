use snipcache_core::{Error, Partition};

use super::{Served, StrategyExecutor};
use crate::Request;

impl StrategyExecutor {
    /// Serve from `partition` when possible, otherwise fetch and populate.
    ///
    /// A miss with a failed fetch surfaces the network error; there is no
    /// offline fallback for assets.
    pub async fn cache_first(&self, request: &Request, partition: &Partition) -> Result<Served, Error> {
        let key = request.key();

        if let Some(cached) = self.match_any(partition, &key).await {
            tracing::debug!(partition = partition.name(), key = %key, "cache hit");
            return Ok(Served::cache(cached));
        }

        tracing::debug!(partition = partition.name(), key = %key, "cache miss, fetching");
        let response = self.network.fetch(request).await?;
        self.populate(request, partition, &response);

        Ok(Served::network(response))
    }
}
