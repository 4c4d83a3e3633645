//! Live dispatch handles keyed by `(tenant, campaign)`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use relay_core::types::{DbId, TenantId};

use super::dispatcher::DispatchHandle;

/// Handles enter on submit and leave when their dispatch finishes.
#[derive(Default)]
pub struct DispatchRegistry {
    handles: Mutex<HashMap<(TenantId, DbId), DispatchHandle>>,
}

impl DispatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(TenantId, DbId), DispatchHandle>> {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, handle: DispatchHandle) {
        self.lock()
            .insert((handle.tenant_id(), handle.campaign_id()), handle);
    }

    /// The running dispatch for a campaign. Tenant-scoped: another tenant's
    /// campaign id never matches.
    pub fn get(&self, tenant_id: TenantId, campaign_id: DbId) -> Option<DispatchHandle> {
        self.lock().get(&(tenant_id, campaign_id)).cloned()
    }

    pub fn remove(&self, tenant_id: TenantId, campaign_id: DbId) -> Option<DispatchHandle> {
        self.lock().remove(&(tenant_id, campaign_id))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pause every running dispatch. Returns how many were paused.
    pub fn pause_all(&self) -> usize {
        let handles: Vec<DispatchHandle> = self.lock().values().cloned().collect();
        for handle in &handles {
            handle.pause();
        }
        handles.len()
    }
}
