//! One collection pass for one tenant.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::lease::TenantLease;
use super::policy::{decide, Verdict};
use super::scanner::StoredVersionScanner;
use super::shutdown::Shutdown;
use crate::metrics::GcMetrics;
use crate::models::{PassOutcome, PassReport, PinnedVersionSet, RemovedVersion};
use crate::storage::{BinaryFs, BinaryLayout, UsageSource};

/// Runs passes: fetch usage, scan, decide, measure and remove.
///
/// Failures never escape a pass. Lookup and scan failures abort the pass,
/// removal failures skip the version, and every invocation counts one run.
pub struct CollectionExecutor {
    fs: Arc<dyn BinaryFs>,
    usage: Arc<dyn UsageSource>,
    metrics: Arc<dyn GcMetrics>,
    scanner: StoredVersionScanner,
    layout: BinaryLayout,
    dry_run: bool,
}

impl CollectionExecutor {
    pub fn new(
        fs: Arc<dyn BinaryFs>,
        usage: Arc<dyn UsageSource>,
        metrics: Arc<dyn GcMetrics>,
        layout: BinaryLayout,
    ) -> Self {
        Self {
            scanner: StoredVersionScanner::new(fs.clone(), layout.clone()),
            fs,
            usage,
            metrics,
            layout,
            dry_run: false,
        }
    }

    /// In a dry run delete verdicts are measured and reported but nothing is removed.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Performs a single pass for the tenant owned by `lease`.
    pub async fn run_pass(
        &self,
        lease: &TenantLease,
        pinned: &PinnedVersionSet,
        shutdown: &Shutdown,
    ) -> PassReport {
        let tenant = lease.tenant();
        let mut report = PassReport::start(tenant.clone());

        if shutdown.is_signalled() {
            return self.finish(report, PassOutcome::Cancelled);
        }

        let used = match self.usage.get_used_versions(tenant).await {
            Ok(used) => used,
            Err(e) => {
                warn!(tenant = %tenant, error = %e, "failed to get used versions");
                return self.finish(report, PassOutcome::LookupFailed);
            }
        };
        info!(tenant = %tenant, used = used.len(), "got all used versions");

        if shutdown.is_signalled() {
            return self.finish(report, PassOutcome::Cancelled);
        }

        let stored = match self.scanner.scan(tenant).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(tenant = %tenant, error = %e, "failed to get stored versions");
                return self.finish(report, PassOutcome::ScanFailed);
            }
        };
        info!(tenant = %tenant, stored = stored.len(), "got all stored versions");

        for version in stored {
            // Undecided versions stay untouched once shutdown is signalled.
            if shutdown.is_signalled() {
                return self.finish(report, PassOutcome::Cancelled);
            }

            match decide(&version, &used, pinned) {
                Verdict::Keep(reason) => {
                    debug!(
                        tenant = %tenant,
                        version = %version,
                        reason = reason.as_str(),
                        "skipped, version should not be deleted"
                    );
                    report.kept.push(version);
                }
                Verdict::Delete => {
                    let path = self.layout.version_dir(tenant, &version);
                    let bytes = self.measure(&path).await;

                    if self.dry_run {
                        info!(
                            tenant = %tenant,
                            version = %version,
                            path = %path.display(),
                            bytes,
                            "dry run, would delete unused version"
                        );
                        report.would_remove.push(RemovedVersion { version, bytes });
                        continue;
                    }

                    info!(
                        tenant = %tenant,
                        version = %version,
                        path = %path.display(),
                        "deleting unused version"
                    );
                    match self.fs.remove_all(&path).await {
                        Ok(()) => {
                            self.metrics.inc_directories_removed();
                            self.metrics.add_bytes_reclaimed(bytes);
                            report.removed.push(RemovedVersion { version, bytes });
                        }
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "delete failed");
                            report.failed.push(version);
                        }
                    }
                }
            }
        }

        self.finish(report, PassOutcome::Completed)
    }

    /// Best-effort size of `path`; a failed measurement counts as zero.
    async fn measure(&self, path: &Path) -> u64 {
        match self.fs.dir_size(path).await {
            Ok(size) => size,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "failed to measure directory size");
                0
            }
        }
    }

    fn finish(&self, report: PassReport, outcome: PassOutcome) -> PassReport {
        self.metrics.inc_gc_runs();
        let report = report.finish(outcome);
        info!(
            tenant = %report.tenant,
            outcome = outcome.as_str(),
            removed = report.removed.len(),
            failed = report.failed.len(),
            bytes_reclaimed = report.bytes_reclaimed(),
            "binary garbage collection pass finished"
        );
        report
    }
}
