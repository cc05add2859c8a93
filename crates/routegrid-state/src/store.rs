//! StateStore — typed CRUD over redb tables.
//!
//! Single-entity reads and writes live here; the multi-entity commit
//! transactions of the lifecycle engine live in `commits.rs`.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tracing::debug;

use route_core::*;

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}
pub(crate) use map_err;

/// Build a tenant-scoped key.
pub(crate) fn key(tenant: &str, id: &str) -> String {
    format!("{tenant}/{id}")
}

/// Prefix matching every key of a tenant.
pub(crate) fn tenant_prefix(tenant: &str) -> String {
    format!("{tenant}/")
}

pub(crate) fn to_bytes<T: serde::Serialize>(value: &T) -> StateResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(map_err!(Serialize))
}

pub(crate) fn from_bytes<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> StateResult<T> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    pub(crate) db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(CONFIGURATIONS).map_err(map_err!(Table))?;
        txn.open_table(JOBS).map_err(map_err!(Table))?;
        txn.open_table(ORDERS).map_err(map_err!(Table))?;
        txn.open_table(VEHICLES).map_err(map_err!(Table))?;
        txn.open_table(DRIVERS).map_err(map_err!(Table))?;
        txn.open_table(ROUTE_STOPS).map_err(map_err!(Table))?;
        txn.open_table(STOP_HISTORY).map_err(map_err!(Table))?;
        txn.open_table(WORKFLOW_STATES).map_err(map_err!(Table))?;
        txn.open_table(WORKFLOW_TRANSITIONS)
            .map_err(map_err!(Table))?;
        txn.open_table(REASSIGNMENTS).map_err(map_err!(Table))?;
        txn.open_table(PLAN_METRICS).map_err(map_err!(Table))?;
        txn.open_table(AUDIT_LOG).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic single-table helpers ───────────────────────────────

    pub(crate) fn put<T: serde::Serialize>(
        &self,
        def: TableDefinition<&str, &[u8]>,
        k: &str,
        value: &T,
    ) -> StateResult<()> {
        let bytes = to_bytes(value)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            table
                .insert(k, bytes.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get<T: serde::de::DeserializeOwned>(
        &self,
        def: TableDefinition<&str, &[u8]>,
        k: &str,
    ) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        match table.get(k).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(from_bytes(guard.value())?)),
            None => Ok(None),
        }
    }

    fn delete(&self, def: TableDefinition<&str, &[u8]>, k: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            existed = table.remove(k).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    /// Collect every value under a key prefix, in key order.
    fn scan_prefix<T: serde::de::DeserializeOwned>(
        &self,
        def: TableDefinition<&str, &[u8]>,
        prefix: &str,
    ) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (k, value) = entry.map_err(map_err!(Read))?;
            if k.value().starts_with(prefix) {
                results.push(from_bytes(value.value())?);
            }
        }
        Ok(results)
    }

    // ── Configurations ─────────────────────────────────────────────

    pub fn put_configuration(&self, config: &PlanConfiguration) -> StateResult<()> {
        self.put(CONFIGURATIONS, &key(&config.tenant_id, &config.id), config)
    }

    pub fn get_configuration(
        &self,
        tenant: &str,
        config_id: &str,
    ) -> StateResult<Option<PlanConfiguration>> {
        self.get(CONFIGURATIONS, &key(tenant, config_id))
    }

    // ── Jobs ───────────────────────────────────────────────────────

    pub fn put_job(&self, job: &OptimizationJob) -> StateResult<()> {
        self.put(JOBS, &key(&job.tenant_id, &job.id), job)
    }

    pub fn get_job(&self, tenant: &str, job_id: &str) -> StateResult<Option<OptimizationJob>> {
        self.get(JOBS, &key(tenant, job_id))
    }

    pub fn list_jobs(&self, tenant: &str) -> StateResult<Vec<OptimizationJob>> {
        self.scan_prefix(JOBS, &tenant_prefix(tenant))
    }

    /// Most recent COMPLETED job carrying a result, by start time.
    pub fn latest_completed_job(&self, tenant: &str) -> StateResult<Option<OptimizationJob>> {
        let jobs = self.list_jobs(tenant)?;
        Ok(jobs
            .into_iter()
            .filter(|j| j.status == JobStatus::Completed && j.result.is_some())
            .max_by_key(|j| j.started_at))
    }

    // ── Orders ─────────────────────────────────────────────────────

    pub fn put_order(&self, order: &Order) -> StateResult<()> {
        self.put(ORDERS, &key(&order.tenant_id, &order.id), order)
    }

    pub fn get_order(&self, tenant: &str, order_id: &str) -> StateResult<Option<Order>> {
        self.get(ORDERS, &key(tenant, order_id))
    }

    pub fn list_orders(&self, tenant: &str) -> StateResult<Vec<Order>> {
        self.scan_prefix(ORDERS, &tenant_prefix(tenant))
    }

    // ── Vehicles / drivers ─────────────────────────────────────────

    pub fn put_vehicle(&self, vehicle: &Vehicle) -> StateResult<()> {
        self.put(VEHICLES, &key(&vehicle.tenant_id, &vehicle.id), vehicle)
    }

    pub fn get_vehicle(&self, tenant: &str, vehicle_id: &str) -> StateResult<Option<Vehicle>> {
        self.get(VEHICLES, &key(tenant, vehicle_id))
    }

    pub fn list_vehicles(&self, tenant: &str) -> StateResult<Vec<Vehicle>> {
        self.scan_prefix(VEHICLES, &tenant_prefix(tenant))
    }

    pub fn put_driver(&self, driver: &Driver) -> StateResult<()> {
        self.put(DRIVERS, &key(&driver.tenant_id, &driver.id), driver)
    }

    pub fn get_driver(&self, tenant: &str, driver_id: &str) -> StateResult<Option<Driver>> {
        self.get(DRIVERS, &key(tenant, driver_id))
    }

    pub fn list_drivers(&self, tenant: &str) -> StateResult<Vec<Driver>> {
        self.scan_prefix(DRIVERS, &tenant_prefix(tenant))
    }

    // ── Route stops ────────────────────────────────────────────────

    pub fn get_stop(&self, tenant: &str, stop_id: &str) -> StateResult<Option<RouteStop>> {
        self.get(ROUTE_STOPS, &key(tenant, stop_id))
    }

    pub fn list_stops_for_job(&self, tenant: &str, job_id: &str) -> StateResult<Vec<RouteStop>> {
        let mut stops: Vec<RouteStop> = self
            .scan_prefix::<RouteStop>(ROUTE_STOPS, &tenant_prefix(tenant))?
            .into_iter()
            .filter(|s| s.job_id == job_id)
            .collect();
        stops.sort_by(|a, b| (&a.route_id, a.sequence).cmp(&(&b.route_id, b.sequence)));
        Ok(stops)
    }

    pub fn list_stops_for_order(
        &self,
        tenant: &str,
        order_id: &str,
    ) -> StateResult<Vec<RouteStop>> {
        Ok(self
            .scan_prefix::<RouteStop>(ROUTE_STOPS, &tenant_prefix(tenant))?
            .into_iter()
            .filter(|s| s.order_id == order_id)
            .collect())
    }

    pub fn list_stops_for_driver(
        &self,
        tenant: &str,
        job_id: &str,
        driver_id: &str,
    ) -> StateResult<Vec<RouteStop>> {
        Ok(self
            .list_stops_for_job(tenant, job_id)?
            .into_iter()
            .filter(|s| s.driver_id == driver_id)
            .collect())
    }

    // ── Stop history ───────────────────────────────────────────────

    /// History entries for one stop, oldest first (the key embeds a
    /// zero-padded sequence, so key order is insertion order).
    pub fn list_stop_history(
        &self,
        tenant: &str,
        stop_id: &str,
    ) -> StateResult<Vec<RouteStopHistory>> {
        self.scan_prefix(STOP_HISTORY, &format!("{tenant}/{stop_id}:"))
    }

    // ── Workflow definitions ───────────────────────────────────────

    pub fn put_workflow_state(&self, state: &WorkflowState) -> StateResult<()> {
        self.put(
            WORKFLOW_STATES,
            &key(&state.tenant_id, &state.id),
            state,
        )
    }

    pub fn delete_workflow_state(&self, tenant: &str, state_id: &str) -> StateResult<bool> {
        self.delete(WORKFLOW_STATES, &key(tenant, state_id))
    }

    pub fn list_workflow_states(&self, tenant: &str) -> StateResult<Vec<WorkflowState>> {
        self.scan_prefix(WORKFLOW_STATES, &tenant_prefix(tenant))
    }

    pub fn put_workflow_transition(&self, transition: &WorkflowTransition) -> StateResult<()> {
        let k = format!(
            "{}/{}>{}",
            transition.tenant_id, transition.from_state_id, transition.to_state_id
        );
        self.put(WORKFLOW_TRANSITIONS, &k, transition)
    }

    pub fn list_workflow_transitions(&self, tenant: &str) -> StateResult<Vec<WorkflowTransition>> {
        self.scan_prefix(WORKFLOW_TRANSITIONS, &tenant_prefix(tenant))
    }

    // ── Reassignments ──────────────────────────────────────────────

    pub fn list_reassignments(&self, tenant: &str) -> StateResult<Vec<ReassignmentRecord>> {
        let mut records: Vec<ReassignmentRecord> =
            self.scan_prefix(REASSIGNMENTS, &tenant_prefix(tenant))?;
        records.sort_by_key(|r| r.executed_at);
        Ok(records)
    }

    // ── Plan metrics ───────────────────────────────────────────────

    pub fn get_plan_metrics(&self, tenant: &str, job_id: &str) -> StateResult<Option<PlanMetrics>> {
        self.get(PLAN_METRICS, &key(tenant, job_id))
    }

    /// The tenant's most recently computed plan metrics (the comparison
    /// baseline for the next confirmation).
    pub fn latest_plan_metrics(&self, tenant: &str) -> StateResult<Option<PlanMetrics>> {
        let all: Vec<PlanMetrics> = self.scan_prefix(PLAN_METRICS, &tenant_prefix(tenant))?;
        Ok(all.into_iter().max_by_key(|m| m.computed_at))
    }

    // ── Audit log ──────────────────────────────────────────────────

    /// Append an audit entry. Best-effort at the call sites: callers log
    /// failures and move on.
    pub fn append_audit(&self, entry: &AuditEntry) -> StateResult<()> {
        let bytes = to_bytes(entry)?;
        let prefix = tenant_prefix(&entry.tenant_id);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(AUDIT_LOG).map_err(map_err!(Table))?;
            let seq = {
                let mut n = 0usize;
                for e in table.iter().map_err(map_err!(Read))? {
                    let (k, _) = e.map_err(map_err!(Read))?;
                    if k.value().starts_with(&prefix) {
                        n += 1;
                    }
                }
                n
            };
            let k = format!("{}{seq:08}", prefix);
            table
                .insert(k.as_str(), bytes.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    pub fn list_audit(&self, tenant: &str) -> StateResult<Vec<AuditEntry>> {
        self.scan_prefix(AUDIT_LOG, &tenant_prefix(tenant))
    }
}
