//! On-disk layout of installed binaries.

use std::path::{Path, PathBuf};

use crate::models::{TenantId, VersionId};

/// Name of the per-tenant directory holding one subdirectory per version.
pub const BINARY_DIR_NAME: &str = "bin";

/// Resolves tenant and version paths under a storage root.
///
/// `<root>/<tenant>/bin/<version>`
#[derive(Debug, Clone)]
pub struct BinaryLayout {
    root: PathBuf,
}

impl BinaryLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tenant_dir(&self, tenant: &TenantId) -> PathBuf {
        self.root.join(tenant.as_str())
    }

    /// Directory whose entries are the stored versions of a tenant.
    pub fn binary_root(&self, tenant: &TenantId) -> PathBuf {
        self.tenant_dir(tenant).join(BINARY_DIR_NAME)
    }

    pub fn version_dir(&self, tenant: &TenantId, version: &VersionId) -> PathBuf {
        self.binary_root(tenant).join(version.as_str())
    }
}
