//! Keep/delete decision for a stored version.

use crate::models::{PinnedVersionSet, UsedVersions, VersionId};

/// Why a version survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepReason {
    Used,
    Pinned,
    UsedAndPinned,
}

impl KeepReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeepReason::Used => "used",
            KeepReason::Pinned => "pinned",
            KeepReason::UsedAndPinned => "used_and_pinned",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep(KeepReason),
    Delete,
}

impl Verdict {
    pub fn is_delete(&self) -> bool {
        matches!(self, Verdict::Delete)
    }
}

/// Decides the fate of one version.
///
/// Usage and pinning are each sufficient to keep a version; deletion needs
/// both to be absent. The verdict depends on nothing but its arguments.
pub fn decide(version: &VersionId, used: &UsedVersions, pinned: &PinnedVersionSet) -> Verdict {
    match (used.is_used(version), pinned.is_pinned(version)) {
        (true, true) => Verdict::Keep(KeepReason::UsedAndPinned),
        (true, false) => Verdict::Keep(KeepReason::Used),
        (false, true) => Verdict::Keep(KeepReason::Pinned),
        (false, false) => Verdict::Delete,
    }
}
