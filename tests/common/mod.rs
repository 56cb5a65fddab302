//! Common test utilities.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use binary_gc::{
    AtomicGcMetrics, BinaryFs, Config, GarbageCollector, GarbageCollectorBuilder, LeaseRegistry,
    MemoryUsageSource, OsBinaryFs, TenantId, UsedVersions, VersionId,
};

/// On-disk storage root with `<tenant>/bin/<version>` directories.
pub struct TestStorage {
    pub dir: TempDir,
}

impl TestStorage {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn version_dir(&self, tenant: &str, version: &str) -> PathBuf {
        self.root().join(tenant).join("bin").join(version)
    }

    /// Installs a version with a main binary of `size` bytes and a small library.
    /// Returns the total size of regular files written.
    pub fn install(&self, tenant: &str, version: &str, size: usize) -> u64 {
        let dir = self.version_dir(tenant, version);
        std::fs::create_dir_all(dir.join("agent/lib")).unwrap();
        std::fs::write(dir.join("agent/oneagent"), vec![0u8; size]).unwrap();
        std::fs::write(dir.join("agent/lib/libagent.so"), vec![1u8; 16]).unwrap();
        size as u64 + 16
    }

    /// Creates a tenant directory without any installed binaries.
    pub fn add_empty_tenant(&self, tenant: &str) {
        std::fs::create_dir_all(self.root().join(tenant)).unwrap();
    }

    pub fn stored(&self, tenant: &str) -> BTreeSet<String> {
        match std::fs::read_dir(self.root().join(tenant).join("bin")) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => BTreeSet::new(),
        }
    }
}

pub fn used(versions: &[&str]) -> UsedVersions {
    versions.iter().copied().collect()
}

pub fn set<'a>(versions: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    versions.into_iter().map(str::to_string).collect()
}

/// Collector wired to in-memory usage and shared metrics.
pub struct TestCollector {
    pub collector: GarbageCollector,
    pub usage: Arc<MemoryUsageSource>,
    pub metrics: Arc<AtomicGcMetrics>,
    pub leases: LeaseRegistry,
}

impl TestCollector {
    pub fn on_disk(root: &Path, pinned: &[&str]) -> Self {
        Self::build(root, pinned, Arc::new(OsBinaryFs::new()), Config::default())
    }

    pub fn build(
        root: &Path,
        pinned: &[&str],
        fs: Arc<dyn BinaryFs>,
        base: Config,
    ) -> Self {
        let usage = Arc::new(MemoryUsageSource::new());
        let metrics = Arc::new(AtomicGcMetrics::new());
        let leases = LeaseRegistry::new();
        let config = Config {
            root: root.to_path_buf(),
            pinned_versions: pinned.iter().map(|v| VersionId::from(*v)).collect(),
            ..base
        };
        let collector = GarbageCollectorBuilder::new()
            .config(config)
            .fs(fs)
            .usage(usage.clone())
            .metrics(metrics.clone())
            .leases(leases.clone())
            .build()
            .unwrap();

        Self {
            collector,
            usage,
            metrics,
            leases,
        }
    }

    pub fn set_used(&self, tenant: &str, versions: &[&str]) {
        self.usage.set_used(TenantId::from(tenant), used(versions));
    }
}
