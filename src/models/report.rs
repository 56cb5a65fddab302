//! Pass and cycle reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{TenantId, VersionId};

/// How a tenant pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassOutcome {
    /// Every stored version was evaluated.
    Completed,
    /// The usage source failed; nothing was scanned or deleted.
    LookupFailed,
    /// The tenant binary root could not be listed; nothing was deleted.
    ScanFailed,
    /// Shutdown was signalled before every version was evaluated.
    Cancelled,
}

impl PassOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassOutcome::Completed => "completed",
            PassOutcome::LookupFailed => "lookup_failed",
            PassOutcome::ScanFailed => "scan_failed",
            PassOutcome::Cancelled => "cancelled",
        }
    }
}

/// A version directory that was (or in a dry run would be) removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedVersion {
    pub version: VersionId,
    /// Bytes measured before removal; zero when measurement failed.
    pub bytes: u64,
}

/// Result of one pass for one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    pub pass_id: Uuid,
    pub tenant: TenantId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: PassOutcome,
    pub kept: Vec<VersionId>,
    pub removed: Vec<RemovedVersion>,
    pub failed: Vec<VersionId>,
    /// Delete verdicts left in place because the pass was a dry run.
    pub would_remove: Vec<RemovedVersion>,
}

impl PassReport {
    pub(crate) fn start(tenant: TenantId) -> Self {
        let now = Utc::now();
        Self {
            pass_id: Uuid::new_v4(),
            tenant,
            started_at: now,
            finished_at: now,
            outcome: PassOutcome::Completed,
            kept: Vec::new(),
            removed: Vec::new(),
            failed: Vec::new(),
            would_remove: Vec::new(),
        }
    }

    pub(crate) fn finish(mut self, outcome: PassOutcome) -> Self {
        self.outcome = outcome;
        self.finished_at = Utc::now();
        self
    }

    /// Total bytes reclaimed by successful removals.
    pub fn bytes_reclaimed(&self) -> u64 {
        self.removed.iter().map(|r| r.bytes).sum()
    }
}

/// Result of one collection cycle across tenants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleReport {
    pub passes: Vec<PassReport>,
    /// Tenants whose lease was already held by another pass.
    pub skipped: Vec<TenantId>,
}

impl CycleReport {
    pub fn directories_removed(&self) -> usize {
        self.passes.iter().map(|p| p.removed.len()).sum()
    }

    pub fn bytes_reclaimed(&self) -> u64 {
        self.passes.iter().map(PassReport::bytes_reclaimed).sum()
    }

    pub fn pass_for(&self, tenant: &TenantId) -> Option<&PassReport> {
        self.passes.iter().find(|p| &p.tenant == tenant)
    }
}
