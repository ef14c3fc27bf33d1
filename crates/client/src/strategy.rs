//! Caching strategies.
//!
//! Each strategy serves one request against one partition:
//!
//! - [`cache_first`]: serve a stored copy, hit the network only on a miss.
//! - [`network_first`]: always try the network, fall back to the stored copy.
//! - [`stale_while_revalidate`]: serve the stored copy at once while a
//!   background fetch refreshes it for the next request.
//!
//! Only 2xx network responses are stored. Error statuses are returned to
//! the caller but never replace a stored copy. Whenever a response is both
//! stored and returned it goes through [`Response::tee`] first.

use std::sync::Arc;
use std::time::Duration;

use mbm_sw_core::{Error, Partition, Request, Response};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::fetch::Fetcher;

/// Where the returned response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServedFrom {
    /// Stored copy, no network round trip needed.
    Cache,
    /// Live network response (and stored for later).
    Network,
    /// Stored copy served because the network failed.
    CacheFallback,
    /// Not intercepted; plain network response, nothing stored.
    PassThrough,
}

/// Pending background refresh started by a stale-while-revalidate hit.
#[derive(Debug)]
pub struct Revalidation {
    handle: JoinHandle<Result<Response, Error>>,
}

impl Revalidation {
    /// Wait for the refresh to be fetched and committed to the cache.
    pub async fn settled(self) -> Result<(), Error> {
        self.into_response().await.map(|_| ())
    }

    async fn into_response(self) -> Result<Response, Error> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(Error::Network(format!("revalidation task did not complete: {e}"))),
        }
    }
}

/// Result of serving one request.
#[derive(Debug)]
pub struct FetchOutcome {
    pub response: Response,
    pub source: ServedFrom,
    /// Set when a cached response was returned while a refresh is in flight.
    pub revalidation: Option<Revalidation>,
}

impl FetchOutcome {
    fn new(response: Response, source: ServedFrom) -> Self {
        Self { response, source, revalidation: None }
    }

    pub(crate) fn pass_through(response: Response) -> Self {
        Self::new(response, ServedFrom::PassThrough)
    }
}

/// Store a copy of a 2xx response in `partition` and return the response.
async fn store_if_ok(partition: &Partition, request: &Request, response: Response) -> Result<Response, Error> {
    if !response.is_ok() {
        tracing::debug!(url = %request.url, status = response.status, "not caching error status");
        return Ok(response);
    }
    let (stored, returned) = response.tee();
    partition.put(request, stored).await?;
    Ok(returned)
}

/// Fetch from the network and store a copy in `partition`.
async fn fetch_and_store(partition: &Partition, fetcher: &dyn Fetcher, request: &Request) -> Result<Response, Error> {
    let response = fetcher.fetch(request).await?;
    store_if_ok(partition, request, response).await
}

/// Cache-first: serve from `partition`, fetch and store only on a miss.
///
/// A miss combined with a network failure propagates the network error.
pub async fn cache_first(
    partition: &Partition, fetcher: &Arc<dyn Fetcher>, request: &Request,
) -> Result<FetchOutcome, Error> {
    if let Some(cached) = partition.match_request(request, None).await? {
        tracing::debug!(url = %request.url, partition = partition.name(), "cache-first hit");
        return Ok(FetchOutcome::new(cached, ServedFrom::Cache));
    }

    tracing::debug!(url = %request.url, partition = partition.name(), "cache-first miss");
    let response = fetch_and_store(partition, fetcher.as_ref(), request).await?;
    Ok(FetchOutcome::new(response, ServedFrom::Network))
}

/// Network-first: fetch and store; on network failure serve the stored copy.
///
/// With no stored copy the network error propagates. Storage errors always
/// propagate.
pub async fn network_first(
    partition: &Partition, fetcher: &Arc<dyn Fetcher>, request: &Request, max_age: Option<Duration>,
) -> Result<FetchOutcome, Error> {
    let network_err = match fetcher.fetch(request).await {
        Ok(response) => {
            let returned = store_if_ok(partition, request, response).await?;
            return Ok(FetchOutcome::new(returned, ServedFrom::Network));
        }
        Err(e) => e,
    };

    match partition.match_request(request, max_age).await? {
        Some(cached) => {
            tracing::debug!(url = %request.url, error = %network_err, "network-first fell back to cache");
            Ok(FetchOutcome::new(cached, ServedFrom::CacheFallback))
        }
        None => Err(network_err),
    }
}

/// Stale-while-revalidate: start a refresh, serve the stored copy if any.
///
/// The refresh runs as its own task so it commits to the cache even when
/// the stored copy is returned first. On a miss the refresh result is the
/// response.
pub async fn stale_while_revalidate(
    partition: &Partition, fetcher: &Arc<dyn Fetcher>, request: &Request, max_age: Option<Duration>,
) -> Result<FetchOutcome, Error> {
    let refresh = {
        let partition = partition.clone();
        let fetcher = Arc::clone(fetcher);
        let request = request.clone();
        tokio::spawn(async move {
            let result = fetch_and_store(&partition, fetcher.as_ref(), &request).await;
            if let Err(e) = &result {
                tracing::warn!(url = %request.url, error = %e, "revalidation failed");
            }
            result
        })
    };

    match partition.match_request(request, max_age).await? {
        Some(cached) => {
            tracing::debug!(url = %request.url, "stale-while-revalidate hit");
            Ok(FetchOutcome {
                response: cached,
                source: ServedFrom::Cache,
                revalidation: Some(Revalidation { handle: refresh }),
            })
        }
        None => {
            tracing::debug!(url = %request.url, "stale-while-revalidate miss");
            let response = Revalidation { handle: refresh }.into_response().await?;
            Ok(FetchOutcome::new(response, ServedFrom::Network))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedFetcher;
    use mbm_sw_core::CacheDb;
    use url::Url;

    fn request(path: &str) -> Request {
        Request::get(Url::parse("http://localhost:3000").unwrap().join(path).unwrap())
    }

    async fn setup(name: &str) -> (Partition, Arc<ScriptedFetcher>, Arc<dyn Fetcher>) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let partition = db.open_partition(name).await.unwrap();
        let scripted = Arc::new(ScriptedFetcher::new());
        let fetcher: Arc<dyn Fetcher> = scripted.clone();
        (partition, scripted, fetcher)
    }

    #[tokio::test]
    async fn test_cache_first_hit_skips_network() {
        let (partition, scripted, fetcher) = setup("mbm-connect-static-v1").await;
        let req = request("/index.html");
        partition
            .put(&req, Response::new(req.url.clone(), 200, "cached shell"))
            .await
            .unwrap();
        scripted.serve("/index.html", 200, "fresh shell");

        let outcome = cache_first(&partition, &fetcher, &req).await.unwrap();
        assert_eq!(outcome.source, ServedFrom::Cache);
        assert_eq!(outcome.response.text(), "cached shell");
        assert_eq!(scripted.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_miss_fetches_and_stores() {
        let (partition, scripted, fetcher) = setup("mbm-connect-static-v1").await;
        scripted.serve("/static/css/main.css", 200, "body{}");
        let req = request("/static/css/main.css");

        let outcome = cache_first(&partition, &fetcher, &req).await.unwrap();
        assert_eq!(outcome.source, ServedFrom::Network);
        assert_eq!(outcome.response.text(), "body{}");

        let stored = partition.match_request(&req, None).await.unwrap().unwrap();
        assert_eq!(stored.text(), "body{}");
    }

    #[tokio::test]
    async fn test_cache_first_miss_offline_propagates() {
        let (partition, scripted, fetcher) = setup("mbm-connect-static-v1").await;
        scripted.set_offline(true);

        let result = cache_first(&partition, &fetcher, &request("/favicon.ico")).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_network_first_prefers_network_even_with_cache() {
        let (partition, scripted, fetcher) = setup("mbm-connect-dynamic").await;
        let req = request("/api/feed");
        partition.put(&req, Response::new(req.url.clone(), 200, "old feed")).await.unwrap();
        scripted.serve("/api/feed", 200, "new feed");

        let outcome = network_first(&partition, &fetcher, &req, None).await.unwrap();
        assert_eq!(outcome.source, ServedFrom::Network);
        assert_eq!(outcome.response.text(), "new feed");
        assert_eq!(scripted.call_count(), 1);

        let stored = partition.match_request(&req, None).await.unwrap().unwrap();
        assert_eq!(stored.text(), "new feed");
    }

    #[tokio::test]
    async fn test_network_first_falls_back_when_offline() {
        let (partition, scripted, fetcher) = setup("mbm-connect-dynamic").await;
        let req = request("/api/feed");
        partition.put(&req, Response::new(req.url.clone(), 200, "last good feed")).await.unwrap();
        scripted.set_offline(true);

        let outcome = network_first(&partition, &fetcher, &req, None).await.unwrap();
        assert_eq!(outcome.source, ServedFrom::CacheFallback);
        assert_eq!(outcome.response.text(), "last good feed");
        assert_eq!(scripted.call_count(), 1);
    }

    #[tokio::test]
    async fn test_network_first_offline_without_cache_propagates() {
        let (partition, scripted, fetcher) = setup("mbm-connect-dynamic").await;
        scripted.set_offline(true);

        let result = network_first(&partition, &fetcher, &request("/api/notifications"), None).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_network_first_error_status_keeps_last_good() {
        let (partition, scripted, fetcher) = setup("mbm-connect-dynamic").await;
        let req = request("/api/feed");
        scripted.serve("/api/feed", 200, "good feed");
        network_first(&partition, &fetcher, &req, None).await.unwrap();

        scripted.serve("/api/feed", 503, "maintenance");
        let outcome = network_first(&partition, &fetcher, &req, None).await.unwrap();
        assert_eq!(outcome.source, ServedFrom::Network);
        assert_eq!(outcome.response.status, 503);

        scripted.set_offline(true);
        let fallback = network_first(&partition, &fetcher, &req, None).await.unwrap();
        assert_eq!(fallback.source, ServedFrom::CacheFallback);
        assert_eq!(fallback.response.status, 200);
        assert_eq!(fallback.response.text(), "good feed");
    }

    #[tokio::test]
    async fn test_cache_first_does_not_pin_error_status() {
        let (partition, scripted, fetcher) = setup("mbm-connect-static-v1").await;
        let req = request("/favicon.ico");
        scripted.serve("/favicon.ico", 404, "not found");

        let outcome = cache_first(&partition, &fetcher, &req).await.unwrap();
        assert_eq!(outcome.response.status, 404);
        assert!(partition.match_request(&req, None).await.unwrap().is_none());

        scripted.serve("/favicon.ico", 200, "icon");
        let outcome = cache_first(&partition, &fetcher, &req).await.unwrap();
        assert_eq!(outcome.source, ServedFrom::Network);
        assert_eq!(outcome.response.text(), "icon");
    }

    #[tokio::test]
    async fn test_swr_miss_returns_network_and_caches() {
        let (partition, scripted, fetcher) = setup("mbm-connect-dynamic").await;
        scripted.serve("/profile/7", 200, "profile v1");
        let req = request("/profile/7");

        let outcome = stale_while_revalidate(&partition, &fetcher, &req, None).await.unwrap();
        assert_eq!(outcome.source, ServedFrom::Network);
        assert_eq!(outcome.response.text(), "profile v1");
        assert!(outcome.revalidation.is_none());

        scripted.set_offline(true);
        let again = stale_while_revalidate(&partition, &fetcher, &req, None).await.unwrap();
        assert_eq!(again.source, ServedFrom::Cache);
        assert_eq!(again.response.text(), "profile v1");
    }

    #[tokio::test]
    async fn test_swr_hit_serves_stale_then_refreshes() {
        let (partition, scripted, fetcher) = setup("mbm-connect-dynamic").await;
        let req = request("/profile/7");
        partition.put(&req, Response::new(req.url.clone(), 200, "stale")).await.unwrap();
        scripted.serve("/profile/7", 200, "fresh");

        let outcome = stale_while_revalidate(&partition, &fetcher, &req, None).await.unwrap();
        assert_eq!(outcome.source, ServedFrom::Cache);
        assert_eq!(outcome.response.text(), "stale");

        outcome.revalidation.unwrap().settled().await.unwrap();
        let stored = partition.match_request(&req, None).await.unwrap().unwrap();
        assert_eq!(stored.text(), "fresh");
    }

    #[tokio::test]
    async fn test_swr_hit_offline_absorbs_refresh_failure() {
        let (partition, scripted, fetcher) = setup("mbm-connect-dynamic").await;
        let req = request("/about");
        partition.put(&req, Response::new(req.url.clone(), 200, "about us")).await.unwrap();
        scripted.set_offline(true);

        let outcome = stale_while_revalidate(&partition, &fetcher, &req, None).await.unwrap();
        assert_eq!(outcome.response.text(), "about us");
        assert!(outcome.revalidation.unwrap().settled().await.is_err());

        let stored = partition.match_request(&req, None).await.unwrap().unwrap();
        assert_eq!(stored.text(), "about us");
    }

    #[tokio::test]
    async fn test_swr_miss_offline_propagates() {
        let (partition, scripted, fetcher) = setup("mbm-connect-dynamic").await;
        scripted.set_offline(true);

        let result = stale_while_revalidate(&partition, &fetcher, &request("/about"), None).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }
}
