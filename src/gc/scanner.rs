//! Enumerates the versions stored on disk for a tenant.

use std::sync::Arc;
use tracing::debug;

use crate::error::GcResult;
use crate::models::{TenantId, VersionId};
use crate::storage::{BinaryFs, BinaryLayout, Listing};

pub struct StoredVersionScanner {
    fs: Arc<dyn BinaryFs>,
    layout: BinaryLayout,
}

impl StoredVersionScanner {
    pub fn new(fs: Arc<dyn BinaryFs>, layout: BinaryLayout) -> Self {
        Self { fs, layout }
    }

    /// Returns the stored versions of `tenant` in enumeration order.
    ///
    /// A tenant without a binary root has no versions. Entry names are used
    /// verbatim.
    pub async fn scan(&self, tenant: &TenantId) -> GcResult<Vec<VersionId>> {
        let path = self.layout.binary_root(tenant);
        match self.fs.list_dir(&path).await? {
            Listing::Absent => {
                debug!(tenant = %tenant, path = %path.display(), "no versions stored");
                Ok(Vec::new())
            }
            Listing::Entries(entries) => Ok(entries.into_iter().map(VersionId::from).collect()),
        }
    }
}
