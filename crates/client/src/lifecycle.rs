//! Worker lifecycle: install, activate, and fetch interception.
//!
//! ```text
//! Parsed ──install()──▶ Installing ──ok──▶ Installed ──activate()──▶ Activating ──▶ Activated
//!    ▲                      │                                                          │
//!    └──── install() ◀── Redundant ◀──err──┘                                 handle_fetch()
//! ```
//!
//! Only an activated worker intercepts requests. Until then every request
//! goes straight to the network. A complete static generation left on disk
//! by an earlier run can be taken over with [`AssetCacheManager::restore`].

use std::fmt;
use std::sync::Arc;

use futures_util::future::try_join_all;
use mbm_sw_core::{AppConfig, CacheDb, CacheLayout, Error, Request};
use serde::Serialize;
use tokio::sync::watch;

use crate::fetch::Fetcher;
use crate::route::{RequestClass, Route, Router};
use crate::strategy::{self, FetchOutcome};

/// Lifecycle phase of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPhase {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed. A later install attempt may still succeed.
    Redundant,
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerPhase::Parsed => "parsed",
            WorkerPhase::Installing => "installing",
            WorkerPhase::Installed => "installed",
            WorkerPhase::Activating => "activating",
            WorkerPhase::Activated => "activated",
            WorkerPhase::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// What activation cleaned up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    /// Stale partitions that were deleted.
    pub deleted_partitions: Vec<String>,
    /// Dynamic entries removed for exceeding the maximum age.
    pub expired_entries: u64,
}

/// The asset cache manager.
///
/// Owns the partition layout, the router and the network fetcher. All
/// partition names come from the injected [`CacheLayout`].
pub struct AssetCacheManager {
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    layout: CacheLayout,
    router: Router,
    phase: watch::Sender<WorkerPhase>,
}

/// Sets the phase when dropped, so a cancelled install or activate does not
/// leave the worker stuck mid-transition.
struct PhaseGuard<'a> {
    phase: &'a watch::Sender<WorkerPhase>,
    on_drop: WorkerPhase,
}

impl<'a> PhaseGuard<'a> {
    fn new(phase: &'a watch::Sender<WorkerPhase>, on_drop: WorkerPhase) -> Self {
        Self { phase, on_drop }
    }

    fn finish(mut self, phase: WorkerPhase) {
        self.on_drop = phase;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.phase.send_replace(self.on_drop);
    }
}

impl AssetCacheManager {
    pub fn new(db: CacheDb, fetcher: Arc<dyn Fetcher>, layout: CacheLayout, router: Router) -> Self {
        Self { db, fetcher, layout, router, phase: watch::Sender::new(WorkerPhase::Parsed) }
    }

    /// Build a manager from loaded configuration.
    pub fn from_config(config: &AppConfig, db: CacheDb, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let router = Router::from_config(config)?;
        Ok(Self::new(db, fetcher, config.layout(), router))
    }

    pub fn phase(&self) -> WorkerPhase {
        *self.phase.borrow()
    }

    /// Watch phase changes.
    pub fn subscribe(&self) -> watch::Receiver<WorkerPhase> {
        self.phase.subscribe()
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn storage(&self) -> &CacheDb {
        &self.db
    }

    /// Move from one of `from` to `to`, or fail with the current phase.
    fn transition(&self, from: &[WorkerPhase], to: WorkerPhase, action: &str) -> Result<(), Error> {
        let mut current = to;
        let moved = self.phase.send_if_modified(|phase| {
            current = *phase;
            if from.contains(phase) {
                *phase = to;
                true
            } else {
                false
            }
        });
        if moved { Ok(()) } else { Err(Error::InvalidState(format!("cannot {action} while {current}"))) }
    }

    /// Install: pre-cache every manifest entry into the static partition.
    ///
    /// All-or-nothing. Every entry must fetch with a 2xx status before
    /// anything is written. On failure the worker becomes redundant and the
    /// error names the first entry that failed. Dropping the future before
    /// it completes also leaves the worker redundant.
    pub async fn install(&self) -> Result<usize, Error> {
        self.transition(&[WorkerPhase::Parsed, WorkerPhase::Redundant], WorkerPhase::Installing, "install")?;
        let guard = PhaseGuard::new(&self.phase, WorkerPhase::Redundant);

        match self.populate_static().await {
            Ok(count) => {
                guard.finish(WorkerPhase::Installed);
                tracing::info!(partition = %self.layout.static_partition, entries = count, "worker installed");
                Ok(count)
            }
            Err(e) => {
                tracing::warn!(partition = %self.layout.static_partition, error = %e, "worker install failed");
                Err(e)
            }
        }
    }

    async fn populate_static(&self) -> Result<usize, Error> {
        let fetches = self.router.manifest().iter().map(|url| async move {
            let request = Request::get(url.clone());
            let response = self
                .fetcher
                .fetch(&request)
                .await
                .map_err(|e| Error::InstallFailed { url: url.to_string(), reason: e.to_string() })?;
            if !response.is_ok() {
                return Err(Error::InstallFailed { url: url.to_string(), reason: format!("status {}", response.status) });
            }
            Ok::<_, Error>((request, response))
        });
        let items = try_join_all(fetches).await?;

        let partition = self.db.open_partition(&self.layout.static_partition).await?;
        partition.put_all(items).await
    }

    /// Activate: delete stale partitions and take control of fetches.
    ///
    /// Static generations other than the current one are always deleted.
    /// Older dynamic generations are deleted when the dynamic partition is
    /// versioned, and expired dynamic entries are purged when a maximum age
    /// is configured.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        self.transition(&[WorkerPhase::Installed], WorkerPhase::Activating, "activate")?;
        let guard = PhaseGuard::new(&self.phase, WorkerPhase::Installed);

        let report = self.collect_garbage().await?;
        guard.finish(WorkerPhase::Activated);
        tracing::info!(
            deleted = ?report.deleted_partitions,
            expired_entries = report.expired_entries,
            "worker activated"
        );
        Ok(report)
    }

    /// Take over the current static generation if an earlier run left it
    /// complete on disk.
    ///
    /// Only allowed before install or after a failed one. Returns whether
    /// the worker is now active. Nothing is fetched or deleted.
    pub async fn restore(&self) -> Result<bool, Error> {
        self.transition(&[WorkerPhase::Parsed, WorkerPhase::Redundant], WorkerPhase::Activating, "restore")?;
        let guard = PhaseGuard::new(&self.phase, WorkerPhase::Redundant);

        if !self.static_generation_complete().await? {
            return Ok(false);
        }
        guard.finish(WorkerPhase::Activated);
        tracing::info!(partition = %self.layout.static_partition, "restored cached static generation");
        Ok(true)
    }

    async fn static_generation_complete(&self) -> Result<bool, Error> {
        if !self.db.has_partition(&self.layout.static_partition).await? {
            return Ok(false);
        }
        let partition = self.db.open_partition(&self.layout.static_partition).await?;
        for url in self.router.manifest() {
            if partition.match_request(&Request::get(url.clone()), None).await?.is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Boot sequence: install then activate.
    ///
    /// When install fails, a complete copy of the current static generation
    /// from an earlier run keeps the worker in control. Otherwise the install
    /// error is returned and requests pass through.
    pub async fn start(&self) -> Result<WorkerPhase, Error> {
        match self.install().await {
            Ok(_) => {
                self.activate().await?;
            }
            Err(e) => {
                if !self.restore().await? {
                    return Err(e);
                }
            }
        }
        Ok(self.phase())
    }

    async fn collect_garbage(&self) -> Result<ActivationReport, Error> {
        let mut report = ActivationReport::default();

        for name in self.db.partition_names().await? {
            if self.layout.is_stale(&name) && self.db.delete_partition(&name).await? {
                tracing::debug!(partition = %name, "deleted stale partition");
                report.deleted_partitions.push(name);
            }
        }

        if let Some(max_age) = self.layout.dynamic_max_age
            && self.db.has_partition(&self.layout.dynamic_partition).await?
        {
            let dynamic = self.db.open_partition(&self.layout.dynamic_partition).await?;
            report.expired_entries = dynamic.purge_older_than(max_age).await?;
        }

        Ok(report)
    }

    /// Intercept a request.
    ///
    /// Returns `None` when the request is not intercepted: the worker is not
    /// active, the request is cross-origin, or its method is not cacheable.
    pub async fn handle_fetch(&self, request: &Request) -> Result<Option<FetchOutcome>, Error> {
        let phase = self.phase();
        if phase != WorkerPhase::Activated {
            tracing::debug!(url = %request.url, %phase, "worker not active, not intercepting");
            return Ok(None);
        }

        let class = match self.router.route(request) {
            Route::PassThrough(reason) => {
                tracing::debug!(url = %request.url, ?reason, "passing through");
                return Ok(None);
            }
            Route::Intercept(class) => class,
        };
        tracing::debug!(url = %request.url, %class, "intercepting");

        let outcome = match class {
            RequestClass::StaticAsset => {
                let partition = self.db.open_partition(&self.layout.static_partition).await?;
                strategy::cache_first(&partition, &self.fetcher, request).await?
            }
            RequestClass::Api => {
                let partition = self.db.open_partition(&self.layout.dynamic_partition).await?;
                strategy::network_first(&partition, &self.fetcher, request, self.layout.dynamic_max_age).await?
            }
            RequestClass::Other => {
                let partition = self.db.open_partition(&self.layout.dynamic_partition).await?;
                strategy::stale_while_revalidate(&partition, &self.fetcher, request, self.layout.dynamic_max_age)
                    .await?
            }
        };

        Ok(Some(outcome))
    }

    /// Serve a request the way the page observes it.
    ///
    /// Intercepted requests go through their strategy. Anything else is a
    /// plain network fetch with nothing stored.
    pub async fn respond(&self, request: &Request) -> Result<FetchOutcome, Error> {
        if let Some(outcome) = self.handle_fetch(request).await? {
            return Ok(outcome);
        }
        let response = self.fetcher.fetch(request).await?;
        Ok(FetchOutcome::pass_through(response))
    }
}
