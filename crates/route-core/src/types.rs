//! Persisted domain entities.
//!
//! All entities are tenant-scoped. Timestamps are unix epoch seconds;
//! optional timestamps come from the boundary parser in [`crate::time`]
//! and are `None` when the upstream value was absent or unparsable.

use serde::{Deserialize, Serialize};

use crate::status::*;

/// Tenant identifier (every entity is scoped to one tenant).
pub type TenantId = String;
/// Plan configuration identifier.
pub type ConfigId = String;
/// Optimization job identifier.
pub type JobId = String;
/// Order identifier.
pub type OrderId = String;
/// Route identifier within a result.
pub type RouteId = String;
/// Route stop identifier.
pub type StopId = String;
/// Driver identifier.
pub type DriverId = String;
/// Vehicle identifier.
pub type VehicleId = String;
/// Fleet identifier.
pub type FleetId = String;
/// Workflow state identifier.
pub type StateId = String;

// ── Plan configuration ─────────────────────────────────────────────

/// Tenant-scoped container for one optimization attempt and its eventual
/// confirmed route set. DRAFT → CONFIRMED is one-way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanConfiguration {
    pub id: ConfigId,
    pub tenant_id: TenantId,
    pub status: ConfigStatus,
    pub depot_lat: f64,
    pub depot_lng: f64,
    pub vehicle_ids: Vec<VehicleId>,
    pub driver_ids: Vec<DriverId>,
    pub objective: Objective,
    pub plan_name: Option<String>,
    pub confirmed_at: Option<i64>,
    pub confirmed_by: Option<String>,
    pub confirmation_note: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

// ── Optimization job ───────────────────────────────────────────────

/// One optimization run attached to a configuration. The result payload is
/// immutable once COMPLETED, except when the reassignment engine rewrites
/// it after a successful apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationJob {
    pub id: JobId,
    pub tenant_id: TenantId,
    pub config_id: ConfigId,
    pub status: JobStatus,
    pub result: Option<crate::result::OptimizationResult>,
    /// Failure detail when status == FAILED.
    pub error: Option<String>,
    pub started_at: i64,
    pub finished_at: Option<i64>,
}

// ── Order ──────────────────────────────────────────────────────────

/// A delivery order. Only PENDING orders may be assigned by confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub tenant_id: TenantId,
    pub tracking_id: String,
    pub status: OrderStatus,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub weight: f64,
    pub volume: f64,
    /// Capability identifiers the serving driver must carry.
    pub required_skills: Vec<String>,
    pub time_window_start: Option<i64>,
    pub time_window_end: Option<i64>,
    /// Expected on-site service duration in seconds.
    pub service_time_secs: Option<u32>,
    pub created_at: i64,
    pub updated_at: i64,
}

// ── Fleet master data ──────────────────────────────────────────────

/// A vehicle available for routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub tenant_id: TenantId,
    pub plate: String,
    pub fleet_id: Option<FleetId>,
    pub max_weight: f64,
    pub max_volume: f64,
    pub active: bool,
}

/// A driver. `base_lat`/`base_lng` is a static home/depot position used for
/// proximity ranking; there is no live GPS in this engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub tenant_id: TenantId,
    pub name: String,
    pub fleet_id: Option<FleetId>,
    pub skills: Vec<String>,
    pub available: bool,
    pub base_lat: Option<f64>,
    pub base_lng: Option<f64>,
}

// ── Route stop ─────────────────────────────────────────────────────

/// One physical visit for one order, created in bulk by confirmation or
/// rewritten by reassignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStop {
    pub id: StopId,
    pub tenant_id: TenantId,
    pub job_id: JobId,
    pub route_id: RouteId,
    pub driver_id: DriverId,
    pub vehicle_id: VehicleId,
    pub order_id: OrderId,
    pub sequence: u32,
    pub status: StopStatus,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub estimated_arrival: Option<i64>,
    pub time_window_start: Option<i64>,
    pub time_window_end: Option<i64>,
    pub service_time_secs: u32,
    pub actual_arrival: Option<i64>,
    pub completed_at: Option<i64>,
    pub failure_reason: Option<String>,
    pub evidence_urls: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Append-only record of one status transition on a route stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStopHistory {
    pub stop_id: StopId,
    pub tenant_id: TenantId,
    /// Monotonic per-stop sequence, assigned inside the commit transaction.
    pub seq: u32,
    pub previous_status: StopStatus,
    pub new_status: StopStatus,
    pub actor: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub changed_at: i64,
}

// ── Workflow definitions ───────────────────────────────────────────

/// Evidence a tenant can require before entering a workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StateRequirements {
    pub photo: bool,
    pub signature: bool,
    pub reason: bool,
    pub notes: bool,
}

/// A tenant-custom delivery state mapped onto exactly one system state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub id: StateId,
    pub tenant_id: TenantId,
    pub label: String,
    pub icon: Option<String>,
    pub system_state: StopStatus,
    pub is_terminal: bool,
    pub is_default: bool,
    pub requirements: StateRequirements,
}

/// A directed, enabled edge between two tenant-custom states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTransition {
    pub tenant_id: TenantId,
    pub from_state_id: StateId,
    pub to_state_id: StateId,
    pub enabled: bool,
}

// ── Reassignment ───────────────────────────────────────────────────

/// One `{driver, stops}` group inside a reassignment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopReassignment {
    pub driver_id: DriverId,
    pub stop_ids: Vec<StopId>,
}

/// Append-only record of one executed reassignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReassignmentRecord {
    pub id: String,
    pub tenant_id: TenantId,
    pub job_id: JobId,
    /// `None` when the move took orders only from the unassigned pool.
    #[serde(default)]
    pub absent_driver_id: Option<DriverId>,
    pub affected_route_ids: Vec<RouteId>,
    pub affected_vehicle_ids: Vec<VehicleId>,
    pub reassignments: Vec<StopReassignment>,
    pub reason: Option<String>,
    pub executed_by: String,
    pub executed_at: i64,
}

// ── Plan metrics ───────────────────────────────────────────────────

/// Write-once aggregate quality metrics for a confirmed job, with
/// comparison against the tenant's previous confirmed plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMetrics {
    pub job_id: JobId,
    pub tenant_id: TenantId,
    pub route_count: u32,
    pub stop_count: u32,
    pub assigned_orders: u32,
    pub unassigned_orders: u32,
    pub total_distance: f64,
    pub total_duration: f64,
    pub total_weight: f64,
    pub total_volume: f64,
    pub avg_utilization: f64,
    pub time_window_violations: u32,
    /// Percentage delta vs. the previous confirmed plan, when one exists.
    pub distance_delta_pct: Option<f64>,
    pub duration_delta_pct: Option<f64>,
    pub previous_job_id: Option<JobId>,
    pub computed_at: i64,
}

// ── Audit ──────────────────────────────────────────────────────────

/// Best-effort action log entry. Writes never fail the surrounding
/// operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub tenant_id: TenantId,
    pub action: String,
    pub actor: String,
    pub detail: serde_json::Value,
    pub at: i64,
}
