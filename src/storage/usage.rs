//! Sources of per-tenant version usage.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;

use crate::error::{ErrorCode, GcError, GcResult};
use crate::models::{TenantId, UsedVersions};

/// Answers which versions are referenced by running workloads of a tenant.
///
/// Implementations must never report a version as unused while a workload is
/// starting with it.
#[async_trait]
pub trait UsageSource: Send + Sync {
    async fn get_used_versions(&self, tenant: &TenantId) -> GcResult<UsedVersions>;
}

/// In-memory usage source with failure injection.
#[derive(Debug, Default)]
pub struct MemoryUsageSource {
    usage: DashMap<TenantId, UsedVersions>,
    failing: DashSet<TenantId>,
}

impl MemoryUsageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_used(&self, tenant: impl Into<TenantId>, used: UsedVersions) {
        self.usage.insert(tenant.into(), used);
    }

    /// Makes lookups for `tenant` fail until cleared.
    pub fn fail_lookup(&self, tenant: impl Into<TenantId>) {
        self.failing.insert(tenant.into());
    }

    pub fn clear_failures(&self) {
        self.failing.clear();
    }
}

#[async_trait]
impl UsageSource for MemoryUsageSource {
    async fn get_used_versions(&self, tenant: &TenantId) -> GcResult<UsedVersions> {
        if self.failing.contains(tenant) {
            return Err(GcError::with_message(
                ErrorCode::LookupFailed,
                format!("usage lookup for tenant {} failed", tenant),
            ));
        }
        Ok(self
            .usage
            .get(tenant)
            .map(|u| u.value().clone())
            .unwrap_or_default())
    }
}

/// Usage source backed by a JSON document, re-read on every lookup.
///
/// ```json
/// { "tenant-a": { "1.2": true }, "tenant-b": {} }
/// ```
///
/// A tenant missing from the document has no used versions. A missing or
/// malformed document is a lookup failure.
#[derive(Debug, Clone)]
pub struct FileUsageSource {
    path: PathBuf,
}

impl FileUsageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl UsageSource for FileUsageSource {
    async fn get_used_versions(&self, tenant: &TenantId) -> GcResult<UsedVersions> {
        let raw = fs::read(&self.path)
            .await
            .map_err(|e| GcError::io(ErrorCode::LookupFailed, &self.path, e))?;

        let mut document: HashMap<TenantId, UsedVersions> = serde_json::from_slice(&raw)
            .map_err(|e| {
                GcError::with_message(
                    ErrorCode::LookupFailed,
                    format!("{}: {}", self.path.display(), e),
                )
            })?;

        Ok(document.remove(tenant).unwrap_or_default())
    }
}
