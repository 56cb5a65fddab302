//! Sources of the pinned version set.

use async_trait::async_trait;

use crate::error::GcResult;
use crate::models::{PinnedVersionSet, VersionId};

/// Supplies the pinned version set at the start of each cycle.
#[async_trait]
pub trait PinnedVersionSource: Send + Sync {
    async fn pinned_versions(&self) -> GcResult<PinnedVersionSet>;
}

/// Fixed pinned versions, typically from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticPinnedVersions {
    versions: Vec<VersionId>,
}

impl StaticPinnedVersions {
    pub fn new<V: Into<VersionId>>(versions: impl IntoIterator<Item = V>) -> Self {
        Self {
            versions: versions.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl PinnedVersionSource for StaticPinnedVersions {
    async fn pinned_versions(&self) -> GcResult<PinnedVersionSet> {
        Ok(self.versions.iter().cloned().collect())
    }
}
