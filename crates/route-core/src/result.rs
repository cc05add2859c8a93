//! Typed solver result schema.
//!
//! The external optimizer produces a camelCase JSON payload. It is parsed
//! into these structs exactly once, at the job boundary; every engine
//! downstream consumes typed data.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DriverId, OrderId, RouteId, VehicleId};

/// Error parsing a solver result payload.
#[derive(Debug, Error)]
pub enum ResultParseError {
    #[error("malformed result payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The complete output of one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    pub routes: Vec<PlannedRoute>,
    #[serde(default)]
    pub unassigned_orders: Vec<UnassignedOrder>,
    #[serde(default)]
    pub metrics: SolverMetrics,
    #[serde(default)]
    pub summary: ResultSummary,
}

/// One planned route: a vehicle/driver pair and its ordered stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedRoute {
    pub route_id: RouteId,
    pub vehicle_id: VehicleId,
    #[serde(default)]
    pub vehicle_plate: String,
    pub driver_id: DriverId,
    pub stops: Vec<PlannedStop>,
    /// Meters.
    #[serde(default)]
    pub total_distance: f64,
    /// Seconds.
    #[serde(default)]
    pub total_duration: f64,
    #[serde(default)]
    pub total_weight: f64,
    #[serde(default)]
    pub total_volume: f64,
    #[serde(default)]
    pub utilization_percentage: f64,
    #[serde(default)]
    pub time_window_violations: u32,
}

/// One planned visit within a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedStop {
    pub order_id: OrderId,
    #[serde(default)]
    pub tracking_id: String,
    pub sequence: u32,
    #[serde(default)]
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,
    /// Timestamp string as emitted by the solver; parsed defensively at
    /// stop-row build time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_arrival: Option<String>,
    /// When several orders are grouped into one physical visit, the full
    /// set of concrete order ids served at this stop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouped_order_ids: Option<Vec<OrderId>>,
}

/// Solver-side time window strings for a stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

/// An order the solver could not place on any route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignedOrder {
    pub order_id: OrderId,
    #[serde(default)]
    pub tracking_id: String,
    #[serde(default)]
    pub reason: String,
}

/// Aggregates the solver reports about its own output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SolverMetrics {
    #[serde(default)]
    pub total_distance: f64,
    #[serde(default)]
    pub total_duration: f64,
    #[serde(default)]
    pub total_routes: u32,
    #[serde(default)]
    pub total_stops: u32,
    #[serde(default)]
    pub computing_time_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance_score: Option<f64>,
}

/// Run summary attached by the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    #[serde(default)]
    pub optimized_at: Option<String>,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub processing_time_ms: Option<u64>,
}

impl OptimizationResult {
    /// Parse a raw solver payload. The single entry point for untyped JSON.
    pub fn parse(bytes: &[u8]) -> Result<Self, ResultParseError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Every concrete order id referenced by any route, grouped orders
    /// expanded, duplicates preserved (the validator flags them).
    pub fn flattened_order_ids(&self) -> Vec<OrderId> {
        self.routes
            .iter()
            .flat_map(|r| r.stops.iter())
            .flat_map(|s| s.concrete_order_ids())
            .collect()
    }

    /// Total number of planned stops across all routes.
    pub fn stop_count(&self) -> usize {
        self.routes.iter().map(|r| r.stops.len()).sum()
    }

    pub fn route_for_vehicle(&self, vehicle_id: &str) -> Option<&PlannedRoute> {
        self.routes.iter().find(|r| r.vehicle_id == vehicle_id)
    }

    pub fn routes_for_driver(&self, driver_id: &str) -> Vec<&PlannedRoute> {
        self.routes
            .iter()
            .filter(|r| r.driver_id == driver_id)
            .collect()
    }
}

impl PlannedStop {
    /// Concrete order ids served at this stop: the grouped set when
    /// present (guaranteed to include the primary order), otherwise the
    /// primary order alone.
    pub fn concrete_order_ids(&self) -> Vec<OrderId> {
        match &self.grouped_order_ids {
            Some(grouped) if !grouped.is_empty() => {
                let mut ids = grouped.clone();
                if !ids.contains(&self.order_id) {
                    ids.insert(0, self.order_id.clone());
                }
                ids
            }
            _ => vec![self.order_id.clone()],
        }
    }
}

impl PlannedRoute {
    /// Renumber stop sequences 1..n after a mutation.
    pub fn resequence(&mut self) {
        for (i, stop) in self.stops.iter_mut().enumerate() {
            stop.sequence = (i + 1) as u32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> &'static str {
        r#"{
            "routes": [{
                "routeId": "route-1",
                "vehicleId": "veh-1",
                "vehiclePlate": "AB-123",
                "driverId": "drv-1",
                "stops": [
                    {
                        "orderId": "ord-1",
                        "trackingId": "TRK-1",
                        "sequence": 1,
                        "address": "1 Main St",
                        "latitude": 40.0,
                        "longitude": -3.7,
                        "timeWindow": {"start": "2026-03-01T08:00:00Z", "end": "2026-03-01T12:00:00Z"},
                        "estimatedArrival": "2026-03-01T09:15:00Z"
                    },
                    {
                        "orderId": "ord-2",
                        "trackingId": "TRK-2",
                        "sequence": 2,
                        "address": "2 Main St",
                        "latitude": 40.1,
                        "longitude": -3.8,
                        "groupedOrderIds": ["ord-2", "ord-3"]
                    }
                ],
                "totalDistance": 12500.0,
                "totalDuration": 5400.0,
                "totalWeight": 320.0,
                "totalVolume": 2.4,
                "utilizationPercentage": 64.0,
                "timeWindowViolations": 0
            }],
            "unassignedOrders": [{"orderId": "ord-9", "trackingId": "TRK-9", "reason": "capacity"}],
            "metrics": {"totalDistance": 12500.0, "totalRoutes": 1, "totalStops": 2, "computingTimeMs": 830.5},
            "summary": {"optimizedAt": "2026-03-01T07:00:00Z", "objective": "BALANCED", "processingTimeMs": 830}
        }"#
    }

    #[test]
    fn parses_full_payload() {
        let result = OptimizationResult::parse(sample_payload().as_bytes()).unwrap();
        assert_eq!(result.routes.len(), 1);
        assert_eq!(result.routes[0].stops.len(), 2);
        assert_eq!(result.unassigned_orders.len(), 1);
        assert_eq!(result.summary.objective.as_deref(), Some("BALANCED"));
    }

    #[test]
    fn parse_rejects_malformed_payload() {
        assert!(OptimizationResult::parse(b"{\"routes\": 3}").is_err());
        assert!(OptimizationResult::parse(b"not json").is_err());
    }

    #[test]
    fn missing_optional_sections_default() {
        let result = OptimizationResult::parse(b"{\"routes\": []}").unwrap();
        assert!(result.routes.is_empty());
        assert!(result.unassigned_orders.is_empty());
        assert_eq!(result.metrics.total_stops, 0);
    }

    #[test]
    fn flatten_expands_grouped_orders() {
        let result = OptimizationResult::parse(sample_payload().as_bytes()).unwrap();
        let ids = result.flattened_order_ids();
        assert_eq!(ids, vec!["ord-1", "ord-2", "ord-3"]);
    }

    #[test]
    fn grouped_set_always_includes_primary() {
        let stop = PlannedStop {
            order_id: "ord-a".into(),
            tracking_id: String::new(),
            sequence: 1,
            address: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            time_window: None,
            estimated_arrival: None,
            grouped_order_ids: Some(vec!["ord-b".into()]),
        };
        assert_eq!(stop.concrete_order_ids(), vec!["ord-a", "ord-b"]);
    }

    #[test]
    fn resequence_renumbers_from_one() {
        let mut result = OptimizationResult::parse(sample_payload().as_bytes()).unwrap();
        let route = &mut result.routes[0];
        route.stops.remove(0);
        route.resequence();
        assert_eq!(route.stops[0].sequence, 1);
    }

    #[test]
    fn serializes_back_to_camel_case() {
        let result = OptimizationResult::parse(sample_payload().as_bytes()).unwrap();
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"routeId\""));
        assert!(json.contains("\"unassignedOrders\""));
        assert!(json.contains("\"utilizationPercentage\""));
    }
}
