//! binary-gc: per-tenant garbage collector for versioned agent binaries.
//!
//! Reclaims disk space held by binary versions that no running workload
//! references, while never deleting pinned versions.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use binary_gc::{Config, GarbageCollectorBuilder, MemoryUsageSource, Shutdown};
//!
//! #[tokio::main]
//! async fn main() {
//!     let collector = GarbageCollectorBuilder::new()
//!         .config(Config::default())
//!         .usage(Arc::new(MemoryUsageSource::new()))
//!         .build()
//!         .unwrap();
//!     let report = collector.collect_cycle(&Shutdown::never()).await.unwrap();
//!     println!("reclaimed {} bytes", report.bytes_reclaimed());
//! }
//! ```

pub mod config;
pub mod error;
pub mod gc;
pub mod metrics;
pub mod models;
pub mod storage;

// Re-exports for convenience
pub use config::{Args, Config, DEFAULT_INTERVAL_SECS, DEFAULT_ROOT};
pub use error::{ErrorCode, GcError, GcResult};
pub use gc::{
    shutdown_channel, CollectionExecutor, GarbageCollector, GarbageCollectorBuilder,
    LeaseRegistry, Shutdown, ShutdownTrigger, TenantLease,
};
pub use crate::metrics::{
    install_prometheus, register_metrics, AtomicGcMetrics, GcMetrics, MetricsSnapshot,
    RecorderGcMetrics,
};
pub use models::{PinnedVersionSet, TenantId, UsedVersions, VersionId};
pub use storage::{
    BinaryFs, BinaryLayout, FileUsageSource, MemoryBinaryFs, MemoryUsageSource, OsBinaryFs,
    PinnedVersionSource, StaticPinnedVersions, UsageSource,
};
