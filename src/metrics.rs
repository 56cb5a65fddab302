//! Collector metrics.
//!
//! Passes record counters through the [`GcMetrics`] trait. The binary uses
//! [`RecorderGcMetrics`], which forwards to the global `metrics` recorder and,
//! when a listen address is configured, is scraped through a Prometheus
//! endpoint. [`AtomicGcMetrics`] keeps in-process counters for reports and tests.

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use crate::error::{ErrorCode, GcError, GcResult};

/// Total tenant passes attempted.
pub const GC_RUNS: &str = "csi_gc_binary_runs_total";

/// Version directories successfully removed.
pub const GC_DIRECTORIES_REMOVED: &str = "csi_gc_binary_directories_removed_total";

/// Bytes reclaimed by successful removals.
pub const GC_BYTES_RECLAIMED: &str = "csi_gc_binary_bytes_reclaimed_total";

/// Sink for collector counters.
pub trait GcMetrics: Send + Sync {
    fn inc_gc_runs(&self);
    fn inc_directories_removed(&self);
    fn add_bytes_reclaimed(&self, bytes: u64);
}

/// Registers the collector metric descriptions.
pub fn register_metrics() {
    describe_counter!(GC_RUNS, "Total binary garbage collection passes attempted");
    describe_counter!(
        GC_DIRECTORIES_REMOVED,
        "Total binary version directories removed"
    );
    describe_counter!(GC_BYTES_RECLAIMED, "Total bytes reclaimed by removals");
}

/// Installs the Prometheus recorder with an HTTP scrape endpoint on `addr`
/// and registers metric descriptions.
///
/// Must be called from within a Tokio runtime.
pub fn install_prometheus(addr: SocketAddr) -> GcResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| {
            GcError::with_message(
                ErrorCode::InvalidConfig,
                format!("failed to install prometheus exporter on {}: {}", addr, e),
            )
        })?;
    register_metrics();
    info!(addr = %addr, "Prometheus metrics endpoint listening");
    Ok(())
}

/// Forwards counters to the global `metrics` recorder.
///
/// Without an installed recorder every update is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecorderGcMetrics;

impl RecorderGcMetrics {
    pub fn new() -> Self {
        Self
    }
}

impl GcMetrics for RecorderGcMetrics {
    fn inc_gc_runs(&self) {
        counter!(GC_RUNS).increment(1);
    }

    fn inc_directories_removed(&self) {
        counter!(GC_DIRECTORIES_REMOVED).increment(1);
    }

    fn add_bytes_reclaimed(&self, bytes: u64) {
        counter!(GC_BYTES_RECLAIMED).increment(bytes);
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub gc_runs: u64,
    pub directories_removed: u64,
    pub bytes_reclaimed: u64,
}

/// Lock-free in-process counters.
#[derive(Debug, Default)]
pub struct AtomicGcMetrics {
    gc_runs: AtomicU64,
    directories_removed: AtomicU64,
    bytes_reclaimed: AtomicU64,
}

impl AtomicGcMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            gc_runs: self.gc_runs.load(Ordering::Relaxed),
            directories_removed: self.directories_removed.load(Ordering::Relaxed),
            bytes_reclaimed: self.bytes_reclaimed.load(Ordering::Relaxed),
        }
    }
}

impl GcMetrics for AtomicGcMetrics {
    fn inc_gc_runs(&self) {
        self.gc_runs.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_directories_removed(&self) {
        self.directories_removed.fetch_add(1, Ordering::Relaxed);
    }

    fn add_bytes_reclaimed(&self, bytes: u64) {
        self.bytes_reclaimed.fetch_add(bytes, Ordering::Relaxed);
    }
}
