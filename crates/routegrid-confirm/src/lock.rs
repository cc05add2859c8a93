//! Per-tenant advisory optimization locks.
//!
//! One optimization/confirmation cycle per tenant at a time. The lock is
//! acquired before optimization starts (outside this engine) and released
//! only after confirmation commits or fails terminally; retryable
//! validation failures keep it so the expected retry still holds it.
//!
//! In-process registry; the store itself serializes writers, so this lock
//! only guards the longer optimize-then-confirm window.

use std::collections::HashSet;
use std::sync::Mutex;

use tracing::debug;

use route_core::TenantId;

/// Registry of tenants currently holding the optimization lock.
#[derive(Debug, Default)]
pub struct TenantLocks {
    held: Mutex<HashSet<TenantId>>,
}

impl TenantLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to acquire the tenant's lock. Returns false when already held.
    pub fn acquire(&self, tenant: &str) -> bool {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        let acquired = held.insert(tenant.to_string());
        if acquired {
            debug!(%tenant, "optimization lock acquired");
        }
        acquired
    }

    pub fn is_held(&self, tenant: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(tenant)
    }

    /// Release the tenant's lock. Idempotent: releasing an unheld lock is
    /// a no-op.
    pub fn release(&self, tenant: &str) -> bool {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        let released = held.remove(tenant);
        if released {
            debug!(%tenant, "optimization lock released");
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_is_exclusive_per_tenant() {
        let locks = TenantLocks::new();
        assert!(locks.acquire("acme"));
        assert!(!locks.acquire("acme"));
        assert!(locks.acquire("other"));
    }

    #[test]
    fn release_is_idempotent() {
        let locks = TenantLocks::new();
        locks.acquire("acme");
        assert!(locks.release("acme"));
        assert!(!locks.release("acme"));
        assert!(!locks.is_held("acme"));
    }
}
