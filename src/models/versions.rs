//! Version sets consumed by the deletion policy.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::VersionId;

/// Versions that must survive collection regardless of usage.
///
/// Computed once per cycle and shared read-only across tenant passes.
#[derive(Debug, Clone, Default)]
pub struct PinnedVersionSet {
    versions: Arc<HashSet<VersionId>>,
}

impl PinnedVersionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pinned(&self, version: &VersionId) -> bool {
        self.versions.contains(version)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

impl<V: Into<VersionId>> FromIterator<V> for PinnedVersionSet {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self {
            versions: Arc::new(iter.into_iter().map(Into::into).collect()),
        }
    }
}

/// Versions referenced by workloads of a single tenant.
///
/// A version counts as used only when its flag is `true`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsedVersions(HashMap<VersionId, bool>);

impl UsedVersions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, version: impl Into<VersionId>, used: bool) {
        self.0.insert(version.into(), used);
    }

    pub fn is_used(&self, version: &VersionId) -> bool {
        self.0.get(version).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<VersionId, bool>> for UsedVersions {
    fn from(map: HashMap<VersionId, bool>) -> Self {
        Self(map)
    }
}

impl<V: Into<VersionId>> FromIterator<V> for UsedVersions {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self(iter.into_iter().map(|v| (v.into(), true)).collect())
    }
}
