//! End-to-end collection tests against a real directory tree.

mod common;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use binary_gc::models::PassOutcome;
use binary_gc::storage::Listing;
use binary_gc::{
    shutdown_channel, BinaryFs, Config, GcResult, MemoryBinaryFs, MetricsSnapshot, Shutdown,
    ShutdownTrigger, TenantId, VersionId,
};
use common::{set, TestCollector, TestStorage};

/// Fires shutdown while the first removal is in flight.
struct ShutdownOnFirstRemove {
    inner: Arc<MemoryBinaryFs>,
    trigger: Mutex<Option<ShutdownTrigger>>,
}

#[async_trait]
impl BinaryFs for ShutdownOnFirstRemove {
    async fn list_dir(&self, path: &Path) -> GcResult<Listing> {
        self.inner.list_dir(path).await
    }

    async fn dir_size(&self, path: &Path) -> GcResult<u64> {
        self.inner.dir_size(path).await
    }

    async fn remove_all(&self, path: &Path) -> GcResult<()> {
        if let Some(trigger) = self.trigger.lock().take() {
            trigger.trigger();
        }
        self.inner.remove_all(path).await
    }
}

#[tokio::test]
async fn test_unused_unpinned_version_is_removed() {
    // T1 stores {1.0, 1.1, 1.2}; 1.2 is used and 1.0 is pinned.
    let storage = TestStorage::new();
    storage.install("T1", "1.0", 100);
    let reclaimed = storage.install("T1", "1.1", 4096);
    storage.install("T1", "1.2", 300);

    let gc = TestCollector::on_disk(storage.root(), &["1.0"]);
    gc.set_used("T1", &["1.2"]);

    let report = gc.collector.collect_cycle(&Shutdown::never()).await.unwrap();

    assert_eq!(storage.stored("T1"), set(["1.0", "1.2"]));
    assert_eq!(
        gc.metrics.snapshot(),
        MetricsSnapshot {
            gc_runs: 1,
            directories_removed: 1,
            bytes_reclaimed: reclaimed,
        }
    );

    let pass = report.pass_for(&TenantId::from("T1")).unwrap();
    assert_eq!(pass.outcome, PassOutcome::Completed);
    assert_eq!(pass.removed.len(), 1);
    assert_eq!(pass.removed[0].version, VersionId::from("1.1"));
    assert_eq!(pass.removed[0].bytes, reclaimed);
}

#[tokio::test]
async fn test_tenant_without_binary_root() {
    let storage = TestStorage::new();
    storage.add_empty_tenant("T2");

    let gc = TestCollector::on_disk(storage.root(), &[]);
    let report = gc.collector.collect_cycle(&Shutdown::never()).await.unwrap();

    let pass = report.pass_for(&TenantId::from("T2")).unwrap();
    assert_eq!(pass.outcome, PassOutcome::Completed);
    assert!(pass.removed.is_empty());
    assert_eq!(gc.metrics.snapshot().gc_runs, 1);
    assert_eq!(gc.metrics.snapshot().directories_removed, 0);
}

#[tokio::test]
async fn test_usage_lookup_failure_deletes_nothing() {
    let storage = TestStorage::new();
    storage.install("T3", "1.0", 10);
    storage.install("T3", "1.1", 10);

    let gc = TestCollector::on_disk(storage.root(), &[]);
    gc.usage.fail_lookup("T3");

    let report = gc.collector.collect_cycle(&Shutdown::never()).await.unwrap();

    let pass = report.pass_for(&TenantId::from("T3")).unwrap();
    assert_eq!(pass.outcome, PassOutcome::LookupFailed);
    assert!(pass.kept.is_empty());
    assert_eq!(storage.stored("T3"), set(["1.0", "1.1"]));
    assert_eq!(gc.metrics.snapshot().gc_runs, 1);
}

#[tokio::test]
async fn test_removal_failure_skips_only_that_version() {
    let fs = Arc::new(MemoryBinaryFs::new());
    fs.write_file("/data/T4/bin/1.0/agent", vec![0u8; 10]);
    fs.write_file("/data/T4/bin/1.1/agent", vec![0u8; 20]);
    fs.write_file("/data/T4/bin/1.2/agent", vec![0u8; 40]);
    fs.fail_remove("/data/T4/bin/1.1");

    let gc = TestCollector::build(
        std::path::Path::new("/data"),
        &[],
        fs.clone(),
        Config::default(),
    );

    let report = gc.collector.collect_cycle(&Shutdown::never()).await.unwrap();

    assert!(!fs.exists("/data/T4/bin/1.0"));
    assert!(fs.exists("/data/T4/bin/1.1/agent"));
    assert!(!fs.exists("/data/T4/bin/1.2"));

    let pass = report.pass_for(&TenantId::from("T4")).unwrap();
    assert_eq!(pass.outcome, PassOutcome::Completed);
    assert_eq!(pass.failed, vec![VersionId::from("1.1")]);
    assert_eq!(
        gc.metrics.snapshot(),
        MetricsSnapshot {
            gc_runs: 1,
            directories_removed: 2,
            bytes_reclaimed: 50,
        }
    );
}

#[tokio::test]
async fn test_second_pass_converges() {
    let storage = TestStorage::new();
    for version in ["1.0", "1.1", "1.2", "1.3"] {
        storage.install("T1", version, 64);
    }

    let gc = TestCollector::on_disk(storage.root(), &["1.0"]);
    gc.set_used("T1", &["1.0", "1.3"]);

    gc.collector.collect_cycle(&Shutdown::never()).await.unwrap();
    assert_eq!(storage.stored("T1"), set(["1.0", "1.3"]));
    let first = gc.metrics.snapshot();

    let report = gc.collector.collect_cycle(&Shutdown::never()).await.unwrap();
    assert_eq!(storage.stored("T1"), set(["1.0", "1.3"]));
    assert_eq!(report.directories_removed(), 0);

    let second = gc.metrics.snapshot();
    assert_eq!(second.gc_runs, first.gc_runs + 1);
    assert_eq!(second.directories_removed, first.directories_removed);
    assert_eq!(second.bytes_reclaimed, first.bytes_reclaimed);
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let storage = TestStorage::new();
    storage.install("a", "1.0", 8);
    storage.install("b", "1.0", 8);
    storage.install("c", "1.0", 8);

    let gc = TestCollector::on_disk(storage.root(), &[]);
    gc.set_used("a", &["1.0"]);
    gc.usage.fail_lookup("c");

    let report = gc.collector.collect_cycle(&Shutdown::never()).await.unwrap();

    assert_eq!(storage.stored("a"), set(["1.0"]));
    assert!(storage.stored("b").is_empty());
    assert_eq!(storage.stored("c"), set(["1.0"]));
    assert_eq!(report.passes.len(), 3);
    assert_eq!(gc.metrics.snapshot().gc_runs, 3);
}

#[tokio::test]
async fn test_concurrent_passes_across_tenants() {
    let storage = TestStorage::new();
    let tenants: Vec<String> = (0..8).map(|i| format!("tenant-{i}")).collect();
    let mut expected_bytes = 0;
    for tenant in &tenants {
        storage.install(tenant, "keep", 32);
        expected_bytes += storage.install(tenant, "drop", 32);
    }

    let gc = TestCollector::build(
        storage.root(),
        &["keep"],
        Arc::new(binary_gc::OsBinaryFs::new()),
        Config {
            concurrency: 4,
            ..Config::default()
        },
    );

    gc.collector.collect_cycle(&Shutdown::never()).await.unwrap();

    for tenant in &tenants {
        assert_eq!(storage.stored(tenant), set(["keep"]));
    }
    let snapshot = gc.metrics.snapshot();
    assert_eq!(snapshot.gc_runs, 8);
    assert_eq!(snapshot.directories_removed, 8);
    assert_eq!(snapshot.bytes_reclaimed, expected_bytes);
}

#[tokio::test]
async fn test_held_lease_skips_tenant() {
    let storage = TestStorage::new();
    storage.install("busy", "1.0", 8);
    storage.install("free", "1.0", 8);

    let gc = TestCollector::on_disk(storage.root(), &[]);
    let lease = gc.leases.try_acquire(&TenantId::from("busy")).unwrap();

    let report = gc.collector.collect_cycle(&Shutdown::never()).await.unwrap();
    drop(lease);

    assert_eq!(report.skipped, vec![TenantId::from("busy")]);
    assert_eq!(storage.stored("busy"), set(["1.0"]));
    assert!(storage.stored("free").is_empty());
    assert_eq!(gc.metrics.snapshot().gc_runs, 1);
}

#[tokio::test]
async fn test_configured_tenants_limit_cycle() {
    let storage = TestStorage::new();
    storage.install("mine", "1.0", 8);
    storage.install("other", "1.0", 8);

    let gc = TestCollector::build(
        storage.root(),
        &[],
        Arc::new(binary_gc::OsBinaryFs::new()),
        Config {
            tenants: vec![TenantId::from("mine")],
            ..Config::default()
        },
    );

    gc.collector.collect_cycle(&Shutdown::never()).await.unwrap();

    assert!(storage.stored("mine").is_empty());
    assert_eq!(storage.stored("other"), set(["1.0"]));
}

#[tokio::test]
async fn test_shutdown_before_cycle_starts_no_pass() {
    let storage = TestStorage::new();
    storage.install("T1", "1.0", 8);

    let gc = TestCollector::on_disk(storage.root(), &[]);
    let (trigger, shutdown) = shutdown_channel();
    trigger.trigger();

    let report = gc.collector.collect_cycle(&shutdown).await.unwrap();

    assert!(report.passes.is_empty());
    assert_eq!(storage.stored("T1"), set(["1.0"]));
}

#[tokio::test]
async fn test_dry_run_cycle_keeps_everything() {
    let storage = TestStorage::new();
    storage.install("T1", "1.0", 8);
    let size = storage.install("T1", "1.1", 8);

    let gc = TestCollector::build(
        storage.root(),
        &[],
        Arc::new(binary_gc::OsBinaryFs::new()),
        Config {
            dry_run: true,
            ..Config::default()
        },
    );
    gc.set_used("T1", &["1.0"]);

    let report = gc.collector.collect_cycle(&Shutdown::never()).await.unwrap();

    assert_eq!(storage.stored("T1"), set(["1.0", "1.1"]));
    let pass = report.pass_for(&TenantId::from("T1")).unwrap();
    assert_eq!(pass.would_remove.len(), 1);
    assert_eq!(pass.would_remove[0].bytes, size);
    assert_eq!(gc.metrics.snapshot().directories_removed, 0);
}

#[tokio::test]
async fn test_run_loop_stops_on_shutdown() {
    let storage = TestStorage::new();
    storage.install("T1", "1.0", 8);

    let gc = TestCollector::on_disk(storage.root(), &[]);
    let (trigger, shutdown) = shutdown_channel();
    let metrics = gc.metrics.clone();
    let handle = tokio::spawn(async move { gc.collector.run(shutdown).await });

    // The first tick fires immediately.
    for _ in 0..100 {
        if metrics.snapshot().gc_runs > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    trigger.trigger();

    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metrics.snapshot().gc_runs, 1);
    assert!(storage.stored("T1").is_empty());
}

#[tokio::test]
async fn test_usage_file_from_config() {
    let storage = TestStorage::new();
    storage.install("T1", "1.0", 8);
    storage.install("T1", "1.1", 8);
    let usage_dir = tempfile::tempdir().unwrap();
    let usage_file = usage_dir.path().join("usage.json");
    std::fs::write(&usage_file, r#"{"T1": {"1.1": true}}"#).unwrap();

    let collector = binary_gc::GarbageCollectorBuilder::new()
        .config(Config {
            root: storage.root().to_path_buf(),
            usage_file: Some(usage_file),
            ..Config::default()
        })
        .build()
        .unwrap();

    collector.collect_cycle(&Shutdown::never()).await.unwrap();

    assert_eq!(storage.stored("T1"), set(["1.1"]));
}

#[tokio::test]
async fn test_shutdown_mid_pass_finishes_decided_removal_only() {
    let memory = Arc::new(MemoryBinaryFs::new());
    memory.write_file("/data/T1/bin/1.0/agent", vec![0u8; 10]);
    memory.write_file("/data/T1/bin/1.1/agent", vec![0u8; 20]);
    memory.write_file("/data/T1/bin/1.2/agent", vec![0u8; 40]);

    let (trigger, shutdown) = shutdown_channel();
    let fs = Arc::new(ShutdownOnFirstRemove {
        inner: memory.clone(),
        trigger: Mutex::new(Some(trigger)),
    });
    let gc = TestCollector::build(Path::new("/data"), &[], fs, Config::default());

    let report = gc.collector.collect_cycle(&shutdown).await.unwrap();

    assert!(!memory.exists("/data/T1/bin/1.0"));
    assert!(memory.exists("/data/T1/bin/1.1/agent"));
    assert!(memory.exists("/data/T1/bin/1.2/agent"));

    let pass = report.pass_for(&TenantId::from("T1")).unwrap();
    assert_eq!(pass.outcome, PassOutcome::Cancelled);
    assert_eq!(pass.removed.len(), 1);
    assert_eq!(pass.removed[0].version, VersionId::from("1.0"));
    assert_eq!(
        gc.metrics.snapshot(),
        MetricsSnapshot {
            gc_runs: 1,
            directories_removed: 1,
            bytes_reclaimed: 10,
        }
    );
}

#[tokio::test]
async fn test_stray_file_in_binary_root_is_removed() {
    let storage = TestStorage::new();
    storage.install("T1", "1.1", 8);
    std::fs::write(storage.version_dir("T1", "1.0"), vec![0u8; 50]).unwrap();

    let gc = TestCollector::on_disk(storage.root(), &[]);
    gc.set_used("T1", &["1.1"]);

    let report = gc.collector.collect_cycle(&Shutdown::never()).await.unwrap();

    assert_eq!(storage.stored("T1"), set(["1.1"]));
    let pass = report.pass_for(&TenantId::from("T1")).unwrap();
    assert!(pass.failed.is_empty());
    assert_eq!(pass.removed.len(), 1);
    assert_eq!(pass.removed[0].bytes, 50);
}

#[cfg(unix)]
#[tokio::test]
async fn test_non_utf8_version_name_is_not_credited() {
    use std::os::unix::ffi::OsStrExt;

    let storage = TestStorage::new();
    let odd = storage
        .root()
        .join("T1")
        .join("bin")
        .join(std::ffi::OsStr::from_bytes(b"caf\xff"));
    std::fs::create_dir_all(&odd).unwrap();
    std::fs::write(odd.join("agent"), vec![0u8; 100]).unwrap();

    let gc = TestCollector::on_disk(storage.root(), &[]);
    let report = gc.collector.collect_cycle(&Shutdown::never()).await.unwrap();

    assert!(odd.join("agent").exists());
    let pass = report.pass_for(&TenantId::from("T1")).unwrap();
    assert_eq!(pass.outcome, PassOutcome::Completed);
    assert!(pass.removed.is_empty());
    assert_eq!(gc.metrics.snapshot().directories_removed, 0);
}
