//! Shared fixtures for the store tests.

use route_core::*;

use crate::store::{key, StateStore};
use crate::tables::ROUTE_STOPS;

pub fn test_configuration(tenant: &str, id: &str, status: ConfigStatus) -> PlanConfiguration {
    PlanConfiguration {
        id: id.to_string(),
        tenant_id: tenant.to_string(),
        status,
        depot_lat: 40.4168,
        depot_lng: -3.7038,
        vehicle_ids: vec!["veh-1".into()],
        driver_ids: vec!["drv-1".into()],
        objective: Objective::Balanced,
        plan_name: None,
        confirmed_at: None,
        confirmed_by: None,
        confirmation_note: None,
        created_at: 1000,
        updated_at: 1000,
    }
}

pub fn test_job(
    tenant: &str,
    id: &str,
    config_id: &str,
    result: Option<OptimizationResult>,
) -> OptimizationJob {
    OptimizationJob {
        id: id.to_string(),
        tenant_id: tenant.to_string(),
        config_id: config_id.to_string(),
        status: JobStatus::Completed,
        result,
        error: None,
        started_at: 1000,
        finished_at: Some(1100),
    }
}

pub fn test_order(tenant: &str, id: &str, status: OrderStatus) -> Order {
    Order {
        id: id.to_string(),
        tenant_id: tenant.to_string(),
        tracking_id: format!("TRK-{id}"),
        status,
        address: "1 Main St".into(),
        latitude: 40.42,
        longitude: -3.70,
        weight: 10.0,
        volume: 0.2,
        required_skills: Vec::new(),
        time_window_start: None,
        time_window_end: None,
        service_time_secs: Some(300),
        created_at: 1000,
        updated_at: 1000,
    }
}

pub fn test_stop(
    tenant: &str,
    id: &str,
    job_id: &str,
    route_id: &str,
    driver_id: &str,
    order_id: &str,
    sequence: u32,
) -> RouteStop {
    RouteStop {
        id: id.to_string(),
        tenant_id: tenant.to_string(),
        job_id: job_id.to_string(),
        route_id: route_id.to_string(),
        driver_id: driver_id.to_string(),
        vehicle_id: "veh-1".into(),
        order_id: order_id.to_string(),
        sequence,
        status: StopStatus::Pending,
        address: "1 Main St".into(),
        latitude: 40.42,
        longitude: -3.70,
        estimated_arrival: None,
        time_window_start: None,
        time_window_end: None,
        service_time_secs: 300,
        actual_arrival: None,
        completed_at: None,
        failure_reason: None,
        evidence_urls: Vec::new(),
        created_at: 1000,
        updated_at: 1000,
    }
}

pub fn empty_result() -> OptimizationResult {
    OptimizationResult {
        routes: Vec::new(),
        unassigned_orders: Vec::new(),
        metrics: SolverMetrics::default(),
        summary: ResultSummary::default(),
    }
}

pub fn test_metrics(tenant: &str, job_id: &str) -> PlanMetrics {
    PlanMetrics {
        job_id: job_id.to_string(),
        tenant_id: tenant.to_string(),
        route_count: 1,
        stop_count: 3,
        assigned_orders: 3,
        unassigned_orders: 0,
        total_distance: 12500.0,
        total_duration: 5400.0,
        total_weight: 30.0,
        total_volume: 0.6,
        avg_utilization: 64.0,
        time_window_violations: 0,
        distance_delta_pct: None,
        duration_delta_pct: None,
        previous_job_id: None,
        computed_at: 1100,
    }
}

/// Insert stop rows directly, bypassing the commit transactions.
pub fn seed_stops(store: &StateStore, stops: &[RouteStop]) {
    for stop in stops {
        store
            .put(ROUTE_STOPS, &key(&stop.tenant_id, &stop.id), stop)
            .unwrap();
    }
}

pub fn test_history(tenant: &str, stop_id: &str, from: StopStatus, to: StopStatus) -> RouteStopHistory {
    RouteStopHistory {
        stop_id: stop_id.to_string(),
        tenant_id: tenant.to_string(),
        seq: 0,
        previous_status: from,
        new_status: to,
        actor: "tester".into(),
        reason: None,
        notes: None,
        changed_at: 1200,
    }
}
