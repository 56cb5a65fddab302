//! Periodic collection cycles across tenants.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::executor::CollectionExecutor;
use super::lease::LeaseRegistry;
use super::shutdown::Shutdown;
use crate::config::Config;
use crate::error::{ErrorCode, GcError, GcResult};
use crate::metrics::{GcMetrics, RecorderGcMetrics};
use crate::models::{CycleReport, PassReport, PinnedVersionSet, TenantId};
use crate::storage::{
    BinaryFs, BinaryLayout, FileUsageSource, Listing, OsBinaryFs, PinnedVersionSource,
    StaticPinnedVersions, UsageSource,
};

enum Slot {
    Ran(PassReport),
    Skipped(TenantId),
    NotStarted,
}

/// Garbage collector for unused binary versions.
pub struct GarbageCollector {
    fs: Arc<dyn BinaryFs>,
    pinned: Arc<dyn PinnedVersionSource>,
    executor: CollectionExecutor,
    leases: LeaseRegistry,
    layout: BinaryLayout,
    tenants: Vec<TenantId>,
    interval: Duration,
    concurrency: usize,
}

impl GarbageCollector {
    /// Creates a collector with default scheduling that discovers tenants
    /// under the layout root.
    pub fn new(
        fs: Arc<dyn BinaryFs>,
        usage: Arc<dyn UsageSource>,
        pinned: Arc<dyn PinnedVersionSource>,
        metrics: Arc<dyn GcMetrics>,
        layout: BinaryLayout,
    ) -> Self {
        let defaults = Config::default();
        Self {
            executor: CollectionExecutor::new(fs.clone(), usage, metrics, layout.clone()),
            fs,
            pinned,
            leases: LeaseRegistry::new(),
            layout,
            tenants: Vec::new(),
            interval: defaults.interval,
            concurrency: defaults.concurrency,
        }
    }

    /// Starts the garbage collection loop. Returns once shutdown is signalled.
    pub async fn run(&self, mut shutdown: Shutdown) {
        let mut interval = time::interval(self.interval);
        // A cycle that overruns the interval delays the next one instead of
        // triggering a burst of catch-up cycles.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.signalled() => {
                    info!("Garbage collector stopping");
                    return;
                }
            }

            match self.collect_cycle(&shutdown).await {
                Ok(report) => info!(
                    passes = report.passes.len(),
                    skipped = report.skipped.len(),
                    directories_removed = report.directories_removed(),
                    bytes_reclaimed = report.bytes_reclaimed(),
                    "Garbage collection cycle finished"
                ),
                Err(e) => warn!("Garbage collection failed: {}", e),
            }
        }
    }

    /// Performs one cycle: fetch the pinned set once, then run one pass per tenant.
    ///
    /// Errors only when the cycle cannot start; per-tenant failures are
    /// reported in the returned [`CycleReport`].
    pub async fn collect_cycle(&self, shutdown: &Shutdown) -> GcResult<CycleReport> {
        debug!("Starting garbage collection");
        let pinned = self.pinned.pinned_versions().await.map_err(|e| {
            GcError::with_message(ErrorCode::PinnedSourceFailed, e.to_string())
        })?;
        let tenants = self.tenants().await?;
        info!(
            tenants = tenants.len(),
            pinned = pinned.len(),
            "Starting binary garbage collection cycle"
        );

        let pinned = &pinned;
        let slots: Vec<Slot> = stream::iter(tenants)
            .map(move |tenant| self.pass(tenant, pinned, shutdown))
            .buffer_unordered(self.concurrency.max(1))
            .collect()
            .await;

        let mut report = CycleReport::default();
        for slot in slots {
            match slot {
                Slot::Ran(pass) => report.passes.push(pass),
                Slot::Skipped(tenant) => report.skipped.push(tenant),
                Slot::NotStarted => {}
            }
        }
        Ok(report)
    }

    async fn pass(
        &self,
        tenant: TenantId,
        pinned: &PinnedVersionSet,
        shutdown: &Shutdown,
    ) -> Slot {
        if shutdown.is_signalled() {
            return Slot::NotStarted;
        }
        let Some(lease) = self.leases.try_acquire(&tenant) else {
            warn!(tenant = %tenant, "tenant is already being collected, skipping");
            return Slot::Skipped(tenant);
        };
        Slot::Ran(self.executor.run_pass(&lease, pinned, shutdown).await)
    }

    async fn tenants(&self) -> GcResult<Vec<TenantId>> {
        if !self.tenants.is_empty() {
            return Ok(self.tenants.clone());
        }
        match self.fs.list_dir(self.layout.root()).await? {
            Listing::Absent => {
                info!(root = %self.layout.root().display(), "storage root does not exist");
                Ok(Vec::new())
            }
            Listing::Entries(entries) => Ok(entries.into_iter().map(TenantId::from).collect()),
        }
    }
}

/// Builder for creating a garbage collector.
pub struct GarbageCollectorBuilder {
    config: Config,
    fs: Option<Arc<dyn BinaryFs>>,
    usage: Option<Arc<dyn UsageSource>>,
    pinned: Option<Arc<dyn PinnedVersionSource>>,
    metrics: Option<Arc<dyn GcMetrics>>,
    leases: Option<LeaseRegistry>,
}

impl GarbageCollectorBuilder {
    /// Creates a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            fs: None,
            usage: None,
            pinned: None,
            metrics: None,
            leases: None,
        }
    }

    /// Sets the configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the filesystem. Defaults to [`OsBinaryFs`].
    pub fn fs(mut self, fs: Arc<dyn BinaryFs>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Sets the usage source. Defaults to a [`FileUsageSource`] over the
    /// configured usage file.
    pub fn usage(mut self, usage: Arc<dyn UsageSource>) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Sets the pinned version source. Defaults to the configured pins.
    pub fn pinned(mut self, pinned: Arc<dyn PinnedVersionSource>) -> Self {
        self.pinned = Some(pinned);
        self
    }

    /// Sets the metrics sink. Defaults to [`RecorderGcMetrics`].
    pub fn metrics(mut self, metrics: Arc<dyn GcMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Shares a lease registry with other collectors in this process.
    pub fn leases(mut self, leases: LeaseRegistry) -> Self {
        self.leases = Some(leases);
        self
    }

    /// Builds the collector.
    ///
    /// Fails if the configuration is invalid or no usage source is available;
    /// collecting without usage information would delete binaries in use.
    pub fn build(self) -> GcResult<GarbageCollector> {
        self.config.validate()?;

        let usage: Arc<dyn UsageSource> = match (self.usage, &self.config.usage_file) {
            (Some(usage), _) => usage,
            (None, Some(path)) => Arc::new(FileUsageSource::new(path.clone())),
            (None, None) => {
                return Err(GcError::with_message(
                    ErrorCode::InvalidConfig,
                    "a usage source or usage file is required",
                ))
            }
        };
        let fs = self.fs.unwrap_or_else(|| Arc::new(OsBinaryFs::new()));
        let pinned = self.pinned.unwrap_or_else(|| {
            Arc::new(StaticPinnedVersions::new(
                self.config.pinned_versions.iter().cloned(),
            ))
        });
        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(RecorderGcMetrics::new()));
        let layout = self.config.layout();

        Ok(GarbageCollector {
            executor: CollectionExecutor::new(fs.clone(), usage, metrics, layout.clone())
                .dry_run(self.config.dry_run),
            fs,
            pinned,
            leases: self.leases.unwrap_or_default(),
            layout,
            tenants: self.config.tenants,
            interval: self.config.interval,
            concurrency: self.config.concurrency,
        })
    }
}

impl Default for GarbageCollectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
