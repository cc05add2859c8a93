//! redb table definitions for the state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain
//! types). Every key begins with the tenant id so tenant-scoped listings
//! are prefix scans.

use redb::TableDefinition;

/// Plan configurations keyed by `{tenant}/{config_id}`.
pub const CONFIGURATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("configurations");

/// Optimization jobs keyed by `{tenant}/{job_id}`.
pub const JOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("jobs");

/// Orders keyed by `{tenant}/{order_id}`.
pub const ORDERS: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// Vehicles keyed by `{tenant}/{vehicle_id}`.
pub const VEHICLES: TableDefinition<&str, &[u8]> = TableDefinition::new("vehicles");

/// Drivers keyed by `{tenant}/{driver_id}`.
pub const DRIVERS: TableDefinition<&str, &[u8]> = TableDefinition::new("drivers");

/// Route stops keyed by `{tenant}/{stop_id}`.
pub const ROUTE_STOPS: TableDefinition<&str, &[u8]> = TableDefinition::new("route_stops");

/// Stop history entries keyed by `{tenant}/{stop_id}:{seq:06}` (append-only).
pub const STOP_HISTORY: TableDefinition<&str, &[u8]> = TableDefinition::new("stop_history");

/// Workflow states keyed by `{tenant}/{state_id}`.
pub const WORKFLOW_STATES: TableDefinition<&str, &[u8]> = TableDefinition::new("workflow_states");

/// Workflow transitions keyed by `{tenant}/{from_state_id}>{to_state_id}`.
pub const WORKFLOW_TRANSITIONS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("workflow_transitions");

/// Reassignment records keyed by `{tenant}/{record_id}` (append-only).
pub const REASSIGNMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("reassignments");

/// Plan metrics keyed by `{tenant}/{job_id}` (write-once).
pub const PLAN_METRICS: TableDefinition<&str, &[u8]> = TableDefinition::new("plan_metrics");

/// Audit entries keyed by `{tenant}/{seq:08}` (append-only, best-effort).
pub const AUDIT_LOG: TableDefinition<&str, &[u8]> = TableDefinition::new("audit_log");
