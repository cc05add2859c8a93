//! Plan metrics — aggregates from a result, compared to the previous plan.

use std::collections::HashSet;

use route_core::{OptimizationResult, PlanMetrics};

/// Percentage delta of `current` vs. `previous`, `None` when the baseline
/// is zero.
fn delta_pct(current: f64, previous: f64) -> Option<f64> {
    if previous > 0.0 {
        Some((current - previous) / previous * 100.0)
    } else {
        None
    }
}

/// Derive plan metrics from a result. Pure computation: runs before the
/// confirmation transaction, gets persisted inside it.
pub fn compute_metrics(
    tenant: &str,
    job_id: &str,
    result: &OptimizationResult,
    previous: Option<&PlanMetrics>,
    now: i64,
) -> PlanMetrics {
    let total_distance: f64 = result.routes.iter().map(|r| r.total_distance).sum();
    let total_duration: f64 = result.routes.iter().map(|r| r.total_duration).sum();
    let total_weight: f64 = result.routes.iter().map(|r| r.total_weight).sum();
    let total_volume: f64 = result.routes.iter().map(|r| r.total_volume).sum();
    let avg_utilization = if result.routes.is_empty() {
        0.0
    } else {
        result
            .routes
            .iter()
            .map(|r| r.utilization_percentage)
            .sum::<f64>()
            / result.routes.len() as f64
    };
    let time_window_violations = result.routes.iter().map(|r| r.time_window_violations).sum();

    let assigned: HashSet<_> = result.flattened_order_ids().into_iter().collect();

    PlanMetrics {
        job_id: job_id.to_string(),
        tenant_id: tenant.to_string(),
        route_count: result.routes.len() as u32,
        stop_count: result.stop_count() as u32,
        assigned_orders: assigned.len() as u32,
        unassigned_orders: result.unassigned_orders.len() as u32,
        total_distance,
        total_duration,
        total_weight,
        total_volume,
        avg_utilization,
        time_window_violations,
        distance_delta_pct: previous.and_then(|p| delta_pct(total_distance, p.total_distance)),
        duration_delta_pct: previous.and_then(|p| delta_pct(total_duration, p.total_duration)),
        previous_job_id: previous.map(|p| p.job_id.clone()),
        computed_at: now,
    }
}
