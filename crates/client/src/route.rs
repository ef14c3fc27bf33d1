//! Request routing and classification.
//!
//! Routing is an ordered, total function. The first matching rule wins:
//!
//! 1. Cross-origin -> pass through untouched
//! 2. Non-GET -> pass through (cache storage only holds GET entries)
//! 3. Path listed in the static manifest -> [`RequestClass::StaticAsset`]
//! 4. Path under the API prefix -> [`RequestClass::Api`]
//! 5. Anything else -> [`RequestClass::Other`]

use std::collections::HashSet;
use std::fmt;

use mbm_sw_core::{AppConfig, Error, Request};
use url::Url;

use crate::fetch::{resolve, same_origin};

/// Category of an intercepted request. Decides the caching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestClass {
    /// Member of the application shell: cache-first.
    StaticAsset,
    /// API call: network-first.
    Api,
    /// Everything else same-origin: stale-while-revalidate.
    Other,
}

impl RequestClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestClass::StaticAsset => "static-asset",
            RequestClass::Api => "api-request",
            RequestClass::Other => "other",
        }
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request is left to the network untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassThroughReason {
    CrossOrigin,
    UncacheableMethod,
}

/// Routing decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    PassThrough(PassThroughReason),
    Intercept(RequestClass),
}

/// Classifies requests for one application origin.
#[derive(Debug, Clone)]
pub struct Router {
    origin: Url,
    manifest: Vec<Url>,
    manifest_paths: HashSet<String>,
    api_prefix: String,
}

impl Router {
    /// Build a router. Manifest entries are resolved against `origin`.
    pub fn new(origin: Url, static_manifest: &[String], api_prefix: &str) -> Result<Self, Error> {
        let manifest = static_manifest
            .iter()
            .map(|path| resolve(&origin, path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;
        let manifest_paths = manifest.iter().map(|url| url.path().to_string()).collect();

        Ok(Self { origin, manifest, manifest_paths, api_prefix: api_prefix.to_string() })
    }

    /// Build a router from loaded configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Self::new(origin, &config.static_manifest, &config.api_prefix)
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Manifest entries as absolute URLs, in manifest order.
    pub fn manifest(&self) -> &[Url] {
        &self.manifest
    }

    /// Classify a same-origin path.
    pub fn classify(&self, path: &str) -> RequestClass {
        if self.manifest_paths.contains(path) {
            RequestClass::StaticAsset
        } else if path.starts_with(&self.api_prefix) || path == self.api_prefix.trim_end_matches('/') {
            RequestClass::Api
        } else {
            RequestClass::Other
        }
    }

    /// Decide whether and how a request is intercepted.
    pub fn route(&self, request: &Request) -> Route {
        if !same_origin(&request.url, &self.origin) {
            return Route::PassThrough(PassThroughReason::CrossOrigin);
        }
        if !request.is_get() {
            return Route::PassThrough(PassThroughReason::UncacheableMethod);
        }
        Route::Intercept(self.classify(request.path()))
    }

    /// Resolve a path or absolute URL into a request target.
    pub fn resolve(&self, input: &str) -> Result<Url, Error> {
        resolve(&self.origin, input).map_err(|e| Error::InvalidUrl(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> Router {
        Router::from_config(&AppConfig::default()).unwrap()
    }

    fn get(router: &Router, target: &str) -> Request {
        Request::get(router.resolve(target).unwrap())
    }

    #[test]
    fn test_classify_static_manifest_members() {
        let router = router();
        assert_eq!(router.classify("/"), RequestClass::StaticAsset);
        assert_eq!(router.classify("/index.html"), RequestClass::StaticAsset);
        assert_eq!(router.classify("/static/js/bundle.js"), RequestClass::StaticAsset);
        assert_eq!(router.classify("/icons/icon-512x512.png"), RequestClass::StaticAsset);
    }

    #[test]
    fn test_classify_literal_membership_only() {
        let router = router();
        assert_eq!(router.classify("/static/js/other.chunk.js"), RequestClass::Other);
        assert_eq!(router.classify("/index.htm"), RequestClass::Other);
    }

    #[test]
    fn test_classify_api() {
        let router = router();
        assert_eq!(router.classify("/api/feed"), RequestClass::Api);
        assert_eq!(router.classify("/api/users/42/block"), RequestClass::Api);
        assert_eq!(router.classify("/api"), RequestClass::Api);
        assert_eq!(router.classify("/apiary"), RequestClass::Other);
    }

    #[test]
    fn test_classify_manifest_wins_over_api_prefix() {
        let origin = Url::parse("http://localhost:3000").unwrap();
        let router = Router::new(origin, &["/api/config.json".to_string()], "/api/").unwrap();
        assert_eq!(router.classify("/api/config.json"), RequestClass::StaticAsset);
        assert_eq!(router.classify("/api/feed"), RequestClass::Api);
    }

    #[test]
    fn test_route_query_string_ignored_for_classification() {
        let router = router();
        let route = router.route(&get(&router, "/index.html?utm=mail"));
        assert_eq!(route, Route::Intercept(RequestClass::StaticAsset));
    }

    #[test]
    fn test_route_cross_origin_passes_through() {
        let router = router();
        let route = router.route(&get(&router, "https://fonts.googleapis.com/css?family=Roboto"));
        assert_eq!(route, Route::PassThrough(PassThroughReason::CrossOrigin));

        let route = router.route(&get(&router, "https://js.stripe.com/api/v3"));
        assert_eq!(route, Route::PassThrough(PassThroughReason::CrossOrigin));
    }

    #[test]
    fn test_route_non_get_passes_through() {
        let router = router();
        let request = Request::new("POST", router.resolve("/api/posts").unwrap());
        assert_eq!(router.route(&request), Route::PassThrough(PassThroughReason::UncacheableMethod));
    }

    #[test]
    fn test_manifest_resolved_in_order() {
        let router = router();
        let first = router.manifest().first().unwrap();
        assert_eq!(first.as_str(), "http://localhost:3000/");
        assert_eq!(router.manifest().len(), AppConfig::default().static_manifest.len());
    }
}
