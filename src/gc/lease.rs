//! Per-tenant ownership tokens.
//!
//! A pass may only run while its caller holds the tenant's lease. The
//! registry serializes passes inside one process; serialization across
//! processes is up to whoever assigns tenants to collector instances.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::TenantId;

#[derive(Debug, Clone, Default)]
pub struct LeaseRegistry {
    held: Arc<Mutex<HashSet<TenantId>>>,
}

impl LeaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lease for `tenant`, or `None` if it is already held.
    pub fn try_acquire(&self, tenant: &TenantId) -> Option<TenantLease> {
        if !self.held.lock().insert(tenant.clone()) {
            return None;
        }
        Some(TenantLease {
            tenant: tenant.clone(),
            token: Uuid::new_v4(),
            held: self.held.clone(),
        })
    }

    pub fn is_held(&self, tenant: &TenantId) -> bool {
        self.held.lock().contains(tenant)
    }
}

/// Exclusive right to collect one tenant. Released on drop.
#[derive(Debug)]
pub struct TenantLease {
    tenant: TenantId,
    token: Uuid,
    held: Arc<Mutex<HashSet<TenantId>>>,
}

impl TenantLease {
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn token(&self) -> Uuid {
        self.token
    }
}

impl Drop for TenantLease {
    fn drop(&mut self) {
        self.held.lock().remove(&self.tenant);
    }
}
