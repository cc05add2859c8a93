//! Plan validator — pure read, classified issues.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use route_core::*;
use routegrid_state::{StateResult, StateStore};

/// Issue severity. ERRORs block confirmation; WARNINGs need an explicit
/// override from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Error,
    Warning,
}

/// Machine-readable issue classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    DuplicateOrder,
    OrderMissing,
    OrderNotPending,
    VehicleMissing,
    DriverMissing,
    DriverUnavailable,
    CapacityExceeded,
    SkillMissing,
    TimeWindowViolations,
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<VehicleId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_id: Option<RouteId>,
}

/// The full validation outcome for one result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Confirmation is possible iff no ERROR-severity issue exists.
    pub fn can_confirm(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Warning)
    }

    /// Warnings present and the caller did not override: the caller must
    /// decide, the engine never ignores them silently.
    pub fn requires_override(&self, override_warnings: bool) -> bool {
        self.has_warnings() && !override_warnings
    }
}

/// Read-only validator over the live state.
#[derive(Clone)]
pub struct PlanValidator {
    store: StateStore,
}

impl PlanValidator {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Cross-check every referenced order, vehicle and driver.
    pub fn validate(
        &self,
        tenant: &str,
        result: &OptimizationResult,
    ) -> StateResult<ValidationReport> {
        let mut issues = Vec::new();

        // Duplicate orders across routes.
        let flattened = result.flattened_order_ids();
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        for order_id in &flattened {
            if !seen.insert(order_id) && reported.insert(order_id) {
                issues.push(ValidationIssue {
                    severity: Severity::Error,
                    code: IssueCode::DuplicateOrder,
                    message: format!("order {order_id} appears in more than one stop"),
                    order_id: Some(order_id.clone()),
                    vehicle_id: None,
                    route_id: None,
                });
            }
        }

        // Order existence and status drift.
        let mut orders: HashMap<OrderId, Order> = HashMap::new();
        for order_id in seen {
            match self.store.get_order(tenant, order_id)? {
                Some(order) => {
                    if order.status != OrderStatus::Pending {
                        issues.push(ValidationIssue {
                            severity: Severity::Warning,
                            code: IssueCode::OrderNotPending,
                            message: format!(
                                "order {order_id} is {:?} and will be skipped",
                                order.status
                            ),
                            order_id: Some(order_id.clone()),
                            vehicle_id: None,
                            route_id: None,
                        });
                    }
                    orders.insert(order_id.clone(), order);
                }
                None => issues.push(ValidationIssue {
                    severity: Severity::Warning,
                    code: IssueCode::OrderMissing,
                    message: format!("order {order_id} no longer exists and will be skipped"),
                    order_id: Some(order_id.clone()),
                    vehicle_id: None,
                    route_id: None,
                }),
            }
        }

        // Per-route vehicle/driver checks.
        for route in &result.routes {
            let vehicle = self.store.get_vehicle(tenant, &route.vehicle_id)?;
            match &vehicle {
                Some(vehicle) => {
                    if route.total_weight > vehicle.max_weight
                        || route.total_volume > vehicle.max_volume
                    {
                        issues.push(ValidationIssue {
                            severity: Severity::Warning,
                            code: IssueCode::CapacityExceeded,
                            message: format!(
                                "route {} load {:.1}kg/{:.2}m3 exceeds vehicle capacity {:.1}kg/{:.2}m3",
                                route.route_id,
                                route.total_weight,
                                route.total_volume,
                                vehicle.max_weight,
                                vehicle.max_volume
                            ),
                            order_id: None,
                            vehicle_id: Some(route.vehicle_id.clone()),
                            route_id: Some(route.route_id.clone()),
                        });
                    }
                }
                None => issues.push(ValidationIssue {
                    severity: Severity::Error,
                    code: IssueCode::VehicleMissing,
                    message: format!("vehicle {} not found", route.vehicle_id),
                    order_id: None,
                    vehicle_id: Some(route.vehicle_id.clone()),
                    route_id: Some(route.route_id.clone()),
                }),
            }

            match self.store.get_driver(tenant, &route.driver_id)? {
                Some(driver) => {
                    if !driver.available {
                        issues.push(ValidationIssue {
                            severity: Severity::Warning,
                            code: IssueCode::DriverUnavailable,
                            message: format!("driver {} is marked unavailable", driver.id),
                            order_id: None,
                            vehicle_id: None,
                            route_id: Some(route.route_id.clone()),
                        });
                    }
                    // Required skills across the route's orders.
                    let mut missing: Vec<&str> = Vec::new();
                    for stop in &route.stops {
                        for order_id in stop.concrete_order_ids() {
                            if let Some(order) = orders.get(&order_id) {
                                for skill in &order.required_skills {
                                    if !driver.skills.contains(skill)
                                        && !missing.contains(&skill.as_str())
                                    {
                                        missing.push(skill);
                                    }
                                }
                            }
                        }
                    }
                    if !missing.is_empty() {
                        issues.push(ValidationIssue {
                            severity: Severity::Warning,
                            code: IssueCode::SkillMissing,
                            message: format!(
                                "driver {} lacks required skills: {}",
                                driver.id,
                                missing.join(", ")
                            ),
                            order_id: None,
                            vehicle_id: None,
                            route_id: Some(route.route_id.clone()),
                        });
                    }
                }
                None => issues.push(ValidationIssue {
                    severity: Severity::Error,
                    code: IssueCode::DriverMissing,
                    message: format!("driver {} not found", route.driver_id),
                    order_id: None,
                    vehicle_id: None,
                    route_id: Some(route.route_id.clone()),
                }),
            }

            if route.time_window_violations > 0 {
                issues.push(ValidationIssue {
                    severity: Severity::Warning,
                    code: IssueCode::TimeWindowViolations,
                    message: format!(
                        "route {} has {} time window violation(s)",
                        route.route_id, route.time_window_violations
                    ),
                    order_id: None,
                    vehicle_id: None,
                    route_id: Some(route.route_id.clone()),
                });
            }
        }

        debug!(
            %tenant,
            issues = issues.len(),
            errors = issues.iter().filter(|i| i.severity == Severity::Error).count(),
            "plan validated"
        );
        Ok(ValidationReport { issues })
    }
}
