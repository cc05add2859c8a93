//! Reassignment engine: options, impact, apply.
//!
//! Options and impact are pure reads. Apply rewrites the job's result
//! payload (remove from source, append to target, drop emptied routes,
//! recompute totals) and commits it atomically together with the
//! append-only record and, on a confirmed plan, the moved stop rows.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use route_core::*;
use routegrid_state::{StateError, StateStore};

use crate::geo::{chain_distance_m, haversine_km, travel_secs};

const DEFAULT_SERVICE_TIME_SECS: u32 = 300;

#[derive(Debug, Error)]
pub enum ReassignError {
    #[error("optimization job {0} not found")]
    JobNotFound(JobId),
    #[error("tenant has no completed optimization job")]
    NoCompletedJob,
    #[error("job {0} carries no result payload")]
    MissingResult(JobId),
    #[error("driver {0} not found")]
    DriverNotFound(DriverId),
    #[error("vehicle {0} not found")]
    VehicleNotFound(VehicleId),
    #[error("order {0} is not part of this plan")]
    OrderNotInPlan(OrderId),
    #[error("creating a route for a vehicle with none requires a target driver")]
    MissingTargetDriver,
    #[error("no orders to reassign")]
    NothingToApply,
    #[error(transparent)]
    State(#[from] StateError),
}

/// Candidate ranking strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RankStrategy {
    #[default]
    FleetFirst,
    Availability,
    Proximity,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsRequest {
    pub absent_driver_id: DriverId,
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub strategy: RankStrategy,
}

/// One ranked replacement candidate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDriver {
    pub driver_id: DriverId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fleet_id: Option<FleetId>,
    pub same_fleet: bool,
    /// The candidate's own non-terminal stop load.
    pub active_stops: u32,
    pub on_route: bool,
    /// Base-to-first-affected-stop distance, when both ends are known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsOutcome {
    pub job_id: JobId,
    pub absent_driver_id: DriverId,
    pub strategy: RankStrategy,
    pub affected_route_ids: Vec<RouteId>,
    pub affected_stop_count: u32,
    pub candidates: Vec<CandidateDriver>,
    /// Set when the outcome is valid but empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactRequest {
    pub absent_driver_id: DriverId,
    pub replacement_driver_id: DriverId,
    pub job_id: JobId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityStatus {
    Available,
    OnRoute,
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactEstimate {
    pub replacement_driver_id: DriverId,
    pub stops_count: u32,
    /// Connection leg plus the absorbed routes, in meters.
    pub additional_distance: f64,
    /// Seconds at the assumed driving speed.
    pub additional_time: f64,
    pub skills_match: bool,
    pub missing_skills: Vec<String>,
    pub availability_status: AvailabilityStatus,
    pub is_valid: bool,
    pub affected_routes_count: u32,
    pub total_affected_stops: u32,
    pub pending_affected_stops: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderMove {
    pub order_id: OrderId,
    /// `None` moves the order out of the unassigned list.
    #[serde(default)]
    pub source_route_id: Option<RouteId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    pub orders: Vec<OrderMove>,
    pub target_vehicle_id: VehicleId,
    /// Required when the target vehicle has no route yet.
    #[serde(default)]
    pub target_driver_id: Option<DriverId>,
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub reason: Option<String>,
    pub executed_by: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    pub result: OptimizationResult,
    pub record: ReassignmentRecord,
    pub stop_rows_updated: u32,
}

#[derive(Clone)]
pub struct ReassignmentEngine {
    store: StateStore,
}

impl ReassignmentEngine {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    fn resolve_job(
        &self,
        tenant: &str,
        job_id: Option<&str>,
    ) -> Result<OptimizationJob, ReassignError> {
        match job_id {
            Some(id) => self
                .store
                .get_job(tenant, id)?
                .ok_or_else(|| ReassignError::JobNotFound(id.to_string())),
            None => self
                .store
                .latest_completed_job(tenant)?
                .ok_or(ReassignError::NoCompletedJob),
        }
    }

    /// Non-terminal stop rows of one driver within one job. Empty for an
    /// unconfirmed plan, where only planned stops exist.
    fn active_rows(
        &self,
        tenant: &str,
        driver_id: &str,
        job_id: &str,
    ) -> Result<Vec<RouteStop>, ReassignError> {
        Ok(self
            .store
            .list_stops_for_driver(tenant, job_id, driver_id)?
            .into_iter()
            .filter(|s| !s.status.is_terminal())
            .collect())
    }

    /// Whether the job's plan was confirmed, i.e. any stop rows exist for
    /// it. Decides whether live rows or planned stops are authoritative.
    fn plan_confirmed(&self, tenant: &str, job_id: &str) -> Result<bool, ReassignError> {
        Ok(!self.store.list_stops_for_job(tenant, job_id)?.is_empty())
    }

    /// Rank replacement candidates for an absent driver.
    pub fn options(
        &self,
        tenant: &str,
        req: &OptionsRequest,
    ) -> Result<OptionsOutcome, ReassignError> {
        let job = self.resolve_job(tenant, req.job_id.as_deref())?;
        let result = job
            .result
            .as_ref()
            .ok_or_else(|| ReassignError::MissingResult(job.id.clone()))?;
        let absent = self
            .store
            .get_driver(tenant, &req.absent_driver_id)?
            .ok_or_else(|| ReassignError::DriverNotFound(req.absent_driver_id.clone()))?;

        let routes = result.routes_for_driver(&absent.id);
        let rows = self.active_rows(tenant, &absent.id, &job.id)?;
        let affected_route_ids: Vec<RouteId> =
            routes.iter().map(|r| r.route_id.clone()).collect();
        // Once confirmed, the live rows are authoritative: a driver whose
        // rows are all terminal has no active routes left to cover.
        let affected_stop_count = if self.plan_confirmed(tenant, &job.id)? {
            rows.len() as u32
        } else {
            routes.iter().map(|r| r.stops.len()).sum::<usize>() as u32
        };

        if affected_stop_count == 0 {
            return Ok(OptionsOutcome {
                job_id: job.id,
                absent_driver_id: absent.id,
                strategy: req.strategy,
                affected_route_ids,
                affected_stop_count: 0,
                candidates: Vec::new(),
                message: Some("driver has no active routes in this plan".into()),
            });
        }

        let anchor = rows
            .first()
            .map(|s| (s.latitude, s.longitude))
            .or_else(|| {
                routes
                    .first()
                    .and_then(|r| r.stops.first())
                    .map(|s| (s.latitude, s.longitude))
            });

        let mut candidates = Vec::new();
        for driver in self.store.list_drivers(tenant)? {
            if driver.id == absent.id || !driver.available {
                continue;
            }
            let load = self.active_rows(tenant, &driver.id, &job.id)?.len() as u32;
            let on_route = load > 0 || !result.routes_for_driver(&driver.id).is_empty();
            let same_fleet = absent.fleet_id.is_some() && driver.fleet_id == absent.fleet_id;
            let distance_km = match (driver.base_lat, driver.base_lng, anchor) {
                (Some(lat), Some(lng), Some(anchor)) => Some(haversine_km((lat, lng), anchor)),
                _ => None,
            };
            candidates.push(CandidateDriver {
                driver_id: driver.id,
                name: driver.name,
                fleet_id: driver.fleet_id,
                same_fleet,
                active_stops: load,
                on_route,
                distance_km,
            });
        }

        let far = f64::MAX;
        match req.strategy {
            RankStrategy::FleetFirst => candidates.sort_by(|a, b| {
                (!a.same_fleet, a.active_stops)
                    .cmp(&(!b.same_fleet, b.active_stops))
                    .then(
                        a.distance_km
                            .unwrap_or(far)
                            .total_cmp(&b.distance_km.unwrap_or(far)),
                    )
            }),
            RankStrategy::Availability => candidates.sort_by(|a, b| {
                (a.on_route, a.active_stops, !a.same_fleet)
                    .cmp(&(b.on_route, b.active_stops, !b.same_fleet))
            }),
            RankStrategy::Proximity => candidates.sort_by(|a, b| {
                a.distance_km
                    .unwrap_or(far)
                    .total_cmp(&b.distance_km.unwrap_or(far))
                    .then((!a.same_fleet).cmp(&!b.same_fleet))
            }),
        }

        let message = candidates
            .is_empty()
            .then(|| "no eligible replacement drivers".to_string());
        Ok(OptionsOutcome {
            job_id: job.id,
            absent_driver_id: absent.id,
            strategy: req.strategy,
            affected_route_ids,
            affected_stop_count,
            candidates,
            message,
        })
    }

    /// Estimate what absorbing the absent driver's routes would cost the
    /// replacement. Pure computation, never mutates.
    pub fn impact(
        &self,
        tenant: &str,
        req: &ImpactRequest,
    ) -> Result<ImpactEstimate, ReassignError> {
        let job = self.resolve_job(tenant, Some(&req.job_id))?;
        let result = job
            .result
            .as_ref()
            .ok_or_else(|| ReassignError::MissingResult(job.id.clone()))?;
        let absent = self
            .store
            .get_driver(tenant, &req.absent_driver_id)?
            .ok_or_else(|| ReassignError::DriverNotFound(req.absent_driver_id.clone()))?;
        let replacement = self
            .store
            .get_driver(tenant, &req.replacement_driver_id)?
            .ok_or_else(|| ReassignError::DriverNotFound(req.replacement_driver_id.clone()))?;

        let routes = result.routes_for_driver(&absent.id);
        let stops_count: u32 = routes.iter().map(|r| r.stops.len()).sum::<usize>() as u32;
        let rows = self.active_rows(tenant, &absent.id, &job.id)?;
        let pending_affected_stops = if self.plan_confirmed(tenant, &job.id)? {
            rows.len() as u32
        } else {
            stops_count
        };

        let availability_status = if !replacement.available {
            AvailabilityStatus::Unavailable
        } else if !result.routes_for_driver(&replacement.id).is_empty()
            || !self.active_rows(tenant, &replacement.id, &job.id)?.is_empty()
        {
            AvailabilityStatus::OnRoute
        } else {
            AvailabilityStatus::Available
        };

        let mut missing_skills: Vec<String> = Vec::new();
        for route in &routes {
            for stop in &route.stops {
                for order_id in stop.concrete_order_ids() {
                    if let Some(order) = self.store.get_order(tenant, &order_id)? {
                        for skill in order.required_skills {
                            if !replacement.skills.contains(&skill)
                                && !missing_skills.contains(&skill)
                            {
                                missing_skills.push(skill);
                            }
                        }
                    }
                }
            }
        }
        let skills_match = missing_skills.is_empty();

        // Connection leg from the replacement's base to the first absorbed
        // stop, plus the absorbed routes themselves.
        let connection_m = match (replacement.base_lat, replacement.base_lng) {
            (Some(lat), Some(lng)) => routes
                .first()
                .and_then(|r| r.stops.first())
                .map(|s| haversine_km((lat, lng), (s.latitude, s.longitude)) * 1000.0)
                .unwrap_or(0.0),
            _ => 0.0,
        };
        let additional_distance =
            connection_m + routes.iter().map(|r| r.total_distance).sum::<f64>();
        let additional_time = travel_secs(additional_distance / 1000.0);

        let is_valid = stops_count > 0
            && skills_match
            && availability_status != AvailabilityStatus::Unavailable;

        Ok(ImpactEstimate {
            replacement_driver_id: replacement.id,
            stops_count,
            additional_distance,
            additional_time,
            skills_match,
            missing_skills,
            availability_status,
            is_valid,
            affected_routes_count: routes.len() as u32,
            total_affected_stops: stops_count,
            pending_affected_stops,
        })
    }

    /// Move the named orders to the target vehicle's route and persist the
    /// rewritten result. Total stop count across the result is conserved.
    pub fn apply(&self, tenant: &str, req: &ApplyRequest) -> Result<ApplyOutcome, ReassignError> {
        if req.orders.is_empty() {
            return Err(ReassignError::NothingToApply);
        }
        let mut job = self.resolve_job(tenant, req.job_id.as_deref())?;
        let mut result = job
            .result
            .clone()
            .ok_or_else(|| ReassignError::MissingResult(job.id.clone()))?;
        let vehicle = self
            .store
            .get_vehicle(tenant, &req.target_vehicle_id)?
            .ok_or_else(|| ReassignError::VehicleNotFound(req.target_vehicle_id.clone()))?;

        let mut moved: Vec<PlannedStop> = Vec::new();
        let mut source_route_ids: Vec<RouteId> = Vec::new();
        let mut source_drivers: Vec<DriverId> = Vec::new();
        let mut source_vehicles: Vec<VehicleId> = Vec::new();
        for mv in &req.orders {
            match &mv.source_route_id {
                Some(route_id) => {
                    let route = result
                        .routes
                        .iter_mut()
                        .find(|r| r.route_id == *route_id)
                        .ok_or_else(|| ReassignError::OrderNotInPlan(mv.order_id.clone()))?;
                    let idx = route
                        .stops
                        .iter()
                        .position(|s| s.concrete_order_ids().contains(&mv.order_id))
                        .ok_or_else(|| ReassignError::OrderNotInPlan(mv.order_id.clone()))?;
                    if !source_route_ids.contains(route_id) {
                        source_route_ids.push(route_id.clone());
                        source_drivers.push(route.driver_id.clone());
                        source_vehicles.push(route.vehicle_id.clone());
                    }
                    moved.push(route.stops.remove(idx));
                }
                None => {
                    let idx = result
                        .unassigned_orders
                        .iter()
                        .position(|u| u.order_id == mv.order_id)
                        .ok_or_else(|| ReassignError::OrderNotInPlan(mv.order_id.clone()))?;
                    let unassigned = result.unassigned_orders.remove(idx);
                    let order = self
                        .store
                        .get_order(tenant, &unassigned.order_id)?
                        .ok_or_else(|| ReassignError::OrderNotInPlan(mv.order_id.clone()))?;
                    moved.push(PlannedStop {
                        order_id: unassigned.order_id,
                        tracking_id: unassigned.tracking_id,
                        sequence: 0,
                        address: order.address,
                        latitude: order.latitude,
                        longitude: order.longitude,
                        time_window: None,
                        estimated_arrival: None,
                        grouped_order_ids: None,
                    });
                }
            }
        }

        // Target route: append to the vehicle's existing route, or open a
        // new one (which needs an explicit driver). An existing route keeps
        // its driver; `target_driver_id` only names the driver of a new one.
        let target_route_id;
        let target_driver_id;
        match result
            .routes
            .iter_mut()
            .find(|r| r.vehicle_id == req.target_vehicle_id)
        {
            Some(route) => {
                target_route_id = route.route_id.clone();
                target_driver_id = route.driver_id.clone();
                route.stops.extend(moved.iter().cloned());
            }
            None => {
                let driver_id = req
                    .target_driver_id
                    .clone()
                    .ok_or(ReassignError::MissingTargetDriver)?;
                target_route_id = format!("route-{}", req.target_vehicle_id);
                result.routes.push(PlannedRoute {
                    route_id: target_route_id.clone(),
                    vehicle_id: req.target_vehicle_id.clone(),
                    vehicle_plate: vehicle.plate.clone(),
                    driver_id: driver_id.clone(),
                    stops: moved.iter().cloned().collect(),
                    total_distance: 0.0,
                    total_duration: 0.0,
                    total_weight: 0.0,
                    total_volume: 0.0,
                    utilization_percentage: 0.0,
                    time_window_violations: 0,
                });
                target_driver_id = driver_id;
            }
        }
        if self.store.get_driver(tenant, &target_driver_id)?.is_none() {
            return Err(ReassignError::DriverNotFound(target_driver_id));
        }

        result.routes.retain(|r| !r.stops.is_empty());
        let affected: HashSet<&str> = source_route_ids
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(target_route_id.as_str()))
            .collect();
        let mut routes = std::mem::take(&mut result.routes);
        for route in routes
            .iter_mut()
            .filter(|r| affected.contains(r.route_id.as_str()))
        {
            self.recompute_route(tenant, route)?;
        }
        result.routes = routes;

        // On a confirmed plan the execution rows follow the new assignment.
        let now = now_epoch();
        let mut stop_updates: Vec<RouteStop> = Vec::new();
        for planned in &moved {
            for order_id in planned.concrete_order_ids() {
                for mut row in self.store.list_stops_for_order(tenant, &order_id)? {
                    if row.job_id == job.id && !row.status.is_terminal() {
                        row.driver_id = target_driver_id.clone();
                        row.vehicle_id = req.target_vehicle_id.clone();
                        row.route_id = target_route_id.clone();
                        row.updated_at = now;
                        stop_updates.push(row);
                    }
                }
            }
        }

        let stop_ids = if stop_updates.is_empty() {
            moved.iter().map(|s| s.order_id.clone()).collect()
        } else {
            stop_updates.iter().map(|s| s.id.clone()).collect()
        };
        let mut affected_route_ids = source_route_ids.clone();
        if !affected_route_ids.contains(&target_route_id) {
            affected_route_ids.push(target_route_id.clone());
        }
        let mut affected_vehicle_ids = source_vehicles;
        if !affected_vehicle_ids.contains(&req.target_vehicle_id) {
            affected_vehicle_ids.push(req.target_vehicle_id.clone());
        }
        let seq = self.store.list_reassignments(tenant)?.len() + 1;
        let record = ReassignmentRecord {
            id: format!("{}-ra-{seq:03}", job.id),
            tenant_id: tenant.to_string(),
            job_id: job.id.clone(),
            absent_driver_id: source_drivers.first().cloned(),
            affected_route_ids,
            affected_vehicle_ids,
            reassignments: vec![StopReassignment {
                driver_id: target_driver_id.clone(),
                stop_ids,
            }],
            reason: req.reason.clone(),
            executed_by: req.executed_by.clone(),
            executed_at: now,
        };

        job.result = Some(result.clone());
        self.store
            .commit_reassignment(tenant, &job, &record, &stop_updates)?;

        let audit = AuditEntry {
            tenant_id: tenant.to_string(),
            action: "reassignment.apply".into(),
            actor: req.executed_by.clone(),
            detail: serde_json::json!({
                "jobId": job.id,
                "targetVehicleId": req.target_vehicle_id,
                "targetDriverId": target_driver_id,
                "ordersMoved": moved.len(),
                "stopRowsUpdated": stop_updates.len(),
            }),
            at: now,
        };
        if let Err(err) = self.store.append_audit(&audit) {
            warn!(%tenant, error = %err, "audit write failed after reassignment commit");
        }

        info!(
            %tenant,
            job_id = %job.id,
            target_driver = %target_driver_id,
            orders_moved = moved.len(),
            "reassignment applied"
        );
        Ok(ApplyOutcome {
            result,
            record,
            stop_rows_updated: stop_updates.len() as u32,
        })
    }

    /// Resequence and recompute a route's totals after a mutation.
    fn recompute_route(
        &self,
        tenant: &str,
        route: &mut PlannedRoute,
    ) -> Result<(), ReassignError> {
        route.resequence();
        let points: Vec<(f64, f64)> = route
            .stops
            .iter()
            .map(|s| (s.latitude, s.longitude))
            .collect();
        route.total_distance = chain_distance_m(&points);

        let mut weight = 0.0;
        let mut volume = 0.0;
        let mut service_secs = 0.0;
        for stop in &route.stops {
            for order_id in stop.concrete_order_ids() {
                if let Some(order) = self.store.get_order(tenant, &order_id)? {
                    weight += order.weight;
                    volume += order.volume;
                    service_secs +=
                        f64::from(order.service_time_secs.unwrap_or(DEFAULT_SERVICE_TIME_SECS));
                } else {
                    service_secs += f64::from(DEFAULT_SERVICE_TIME_SECS);
                }
            }
        }
        route.total_weight = weight;
        route.total_volume = volume;
        route.total_duration = travel_secs(route.total_distance / 1000.0) + service_secs;
        route.utilization_percentage = match self
            .store
            .get_vehicle(tenant, &route.vehicle_id)?
        {
            Some(v) if v.max_weight > 0.0 && v.max_volume > 0.0 => {
                (weight / v.max_weight).max(volume / v.max_volume) * 100.0
            }
            _ => 0.0,
        };
        Ok(())
    }
}
