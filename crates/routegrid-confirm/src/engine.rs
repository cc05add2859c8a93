//! The confirmation engine.
//!
//! Orchestrates validate → partition → build → commit. Validation and stop
//! row construction run unlocked against live state; the store commit
//! re-checks the configuration status and aborts on a lost race. The
//! tenant's advisory optimization lock is released on success and on
//! terminal failure; retryable outcomes (blocking validation issues,
//! warnings awaiting an override, an optimization still running) keep it
//! so the expected retry still owns the cycle.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use route_core::*;
use routegrid_state::{ConfirmationStamp, StateError, StateStore};
use routegrid_validate::{compute_metrics, PlanValidator, ValidationReport};

use crate::lock::TenantLocks;

/// On-site service duration applied when the order does not carry one.
const DEFAULT_SERVICE_TIME_SECS: u32 = 300;

#[derive(Debug, Error)]
pub enum ConfirmError {
    #[error("optimization job {0} not found")]
    JobNotFound(JobId),
    #[error("optimization job {0} is not COMPLETED")]
    JobNotCompleted(JobId),
    #[error("an optimization is still in progress for this plan")]
    OptimizationInProgress,
    #[error("plan configuration {0} not found")]
    ConfigurationNotFound(ConfigId),
    #[error("plan configuration {0} is already confirmed")]
    AlreadyConfirmed(ConfigId),
    #[error("optimization result contains no routes")]
    EmptyRoutes,
    #[error("completed job {0} carries no result payload")]
    MissingResult(JobId),
    #[error("no confirmable orders remain in this plan")]
    NothingToConfirm,
    #[error("plan validation found blocking errors")]
    ValidationFailed(ValidationReport),
    #[error("plan validation found warnings and no override was given")]
    UnresolvedWarnings(ValidationReport),
    #[error(transparent)]
    State(#[from] StateError),
}

impl ConfirmError {
    /// Terminal failures end the optimize-then-confirm cycle and release
    /// the tenant lock. Retryable ones expect the same caller to fix the
    /// input and try again while still holding it.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            ConfirmError::ValidationFailed(_)
                | ConfirmError::UnresolvedWarnings(_)
                | ConfirmError::OptimizationInProgress
        )
    }
}

/// Caller input to one confirmation attempt.
#[derive(Debug, Clone)]
pub struct ConfirmRequest {
    pub job_id: JobId,
    /// Accept WARNING-severity validation issues.
    pub override_warnings: bool,
    pub confirmation_note: Option<String>,
    pub plan_name: Option<String>,
    pub confirmed_by: String,
}

/// Orders the plan referenced but confirmation had to leave out.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedOrders {
    pub count: u32,
    pub missing_count: u32,
    pub non_pending_count: u32,
    pub missing_order_ids: Vec<OrderId>,
    pub non_pending_order_ids: Vec<OrderId>,
}

/// Everything a successful confirmation produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOutcome {
    pub orders_assigned: u32,
    pub route_stops_created: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_orders: Option<SkippedOrders>,
    pub configuration: PlanConfiguration,
    pub validation: ValidationReport,
    pub plan_metrics: PlanMetrics,
}

/// Turns a completed optimization job into confirmed, durable state.
#[derive(Clone)]
pub struct ConfirmationEngine {
    store: StateStore,
    validator: PlanValidator,
    locks: Arc<TenantLocks>,
}

impl ConfirmationEngine {
    pub fn new(store: StateStore, locks: Arc<TenantLocks>) -> Self {
        let validator = PlanValidator::new(store.clone());
        Self {
            store,
            validator,
            locks,
        }
    }

    /// Run one confirmation attempt and apply the lock release policy.
    pub fn confirm(&self, tenant: &str, req: &ConfirmRequest) -> Result<ConfirmOutcome, ConfirmError> {
        let result = self.confirm_inner(tenant, req);
        match &result {
            Ok(_) => {
                self.locks.release(tenant);
            }
            Err(err) if err.is_terminal() => {
                self.locks.release(tenant);
            }
            Err(_) => {}
        }
        result
    }

    fn confirm_inner(
        &self,
        tenant: &str,
        req: &ConfirmRequest,
    ) -> Result<ConfirmOutcome, ConfirmError> {
        let job = self
            .store
            .get_job(tenant, &req.job_id)?
            .ok_or_else(|| ConfirmError::JobNotFound(req.job_id.clone()))?;
        match job.status {
            JobStatus::Completed => {}
            JobStatus::Running => return Err(ConfirmError::OptimizationInProgress),
            JobStatus::Failed => return Err(ConfirmError::JobNotCompleted(req.job_id.clone())),
        }
        let result = job
            .result
            .as_ref()
            .ok_or_else(|| ConfirmError::MissingResult(req.job_id.clone()))?;
        if result.routes.is_empty() {
            return Err(ConfirmError::EmptyRoutes);
        }

        let config = self
            .store
            .get_configuration(tenant, &job.config_id)?
            .ok_or_else(|| ConfirmError::ConfigurationNotFound(job.config_id.clone()))?;
        match config.status {
            ConfigStatus::Draft => {}
            ConfigStatus::Optimizing => return Err(ConfirmError::OptimizationInProgress),
            ConfigStatus::Confirmed => {
                return Err(ConfirmError::AlreadyConfirmed(job.config_id.clone()))
            }
        }

        let validation = self.validator.validate(tenant, result)?;
        if !validation.can_confirm() {
            return Err(ConfirmError::ValidationFailed(validation));
        }
        if validation.requires_override(req.override_warnings) {
            return Err(ConfirmError::UnresolvedWarnings(validation));
        }

        // Partition the referenced orders: still-PENDING ones get assigned,
        // the rest are reported back as skipped, never silently dropped.
        let mut confirmable: Vec<OrderId> = Vec::new();
        let mut confirmable_set: HashSet<OrderId> = HashSet::new();
        let mut missing: Vec<OrderId> = Vec::new();
        let mut non_pending: Vec<OrderId> = Vec::new();
        let mut seen: HashSet<OrderId> = HashSet::new();
        for order_id in result.flattened_order_ids() {
            if !seen.insert(order_id.clone()) {
                continue;
            }
            match self.store.get_order(tenant, &order_id)? {
                Some(order) if order.status == OrderStatus::Pending => {
                    confirmable_set.insert(order_id.clone());
                    confirmable.push(order_id);
                }
                Some(_) => non_pending.push(order_id),
                None => missing.push(order_id),
            }
        }
        if confirmable.is_empty() {
            return Err(ConfirmError::NothingToConfirm);
        }

        let now = now_epoch();
        let stops = self.build_stops(tenant, &req.job_id, result, &confirmable_set, now)?;

        let previous = self.store.latest_plan_metrics(tenant)?;
        let metrics = compute_metrics(tenant, &req.job_id, result, previous.as_ref(), now);

        let stamp = ConfirmationStamp {
            confirmed_by: req.confirmed_by.clone(),
            confirmation_note: req.confirmation_note.clone(),
            plan_name: req.plan_name.clone(),
            now,
        };
        let commit = self
            .store
            .commit_confirmation(tenant, &job.config_id, &stamp, &confirmable, &stops, &metrics)
            .map_err(|err| match err {
                StateError::Conflict(_) => ConfirmError::AlreadyConfirmed(job.config_id.clone()),
                StateError::NotFound(_) => {
                    ConfirmError::ConfigurationNotFound(job.config_id.clone())
                }
                other => ConfirmError::State(other),
            })?;

        let skipped = if missing.is_empty() && non_pending.is_empty() {
            None
        } else {
            Some(SkippedOrders {
                count: (missing.len() + non_pending.len()) as u32,
                missing_count: missing.len() as u32,
                non_pending_count: non_pending.len() as u32,
                missing_order_ids: missing,
                non_pending_order_ids: non_pending,
            })
        };

        // Audit is best-effort: a failed write never unwinds the commit.
        let audit = AuditEntry {
            tenant_id: tenant.to_string(),
            action: "plan.confirm".into(),
            actor: req.confirmed_by.clone(),
            detail: serde_json::json!({
                "jobId": req.job_id,
                "configId": job.config_id,
                "ordersAssigned": commit.orders_assigned,
                "routeStopsCreated": stops.len(),
                "skippedOrders": skipped.as_ref().map(|s| s.count).unwrap_or(0),
            }),
            at: now,
        };
        if let Err(err) = self.store.append_audit(&audit) {
            warn!(%tenant, error = %err, "audit write failed after confirmation commit");
        }

        info!(
            %tenant,
            job_id = %req.job_id,
            orders_assigned = commit.orders_assigned,
            stops_created = stops.len(),
            "plan confirmation completed"
        );
        Ok(ConfirmOutcome {
            orders_assigned: commit.orders_assigned,
            route_stops_created: stops.len() as u32,
            skipped_orders: skipped,
            configuration: commit.configuration,
            validation,
            plan_metrics: metrics,
        })
    }

    /// Materialize route stop rows from the planned routes, one row per
    /// confirmable concrete order. Grouped orders expand into consecutive
    /// rows at the same coordinates; skipped orders leave no row.
    fn build_stops(
        &self,
        tenant: &str,
        job_id: &str,
        result: &OptimizationResult,
        confirmable: &HashSet<OrderId>,
        now: i64,
    ) -> Result<Vec<RouteStop>, ConfirmError> {
        let mut stops = Vec::new();
        let mut counter = 0u32;
        for route in &result.routes {
            let mut sequence = 0u32;
            for planned in &route.stops {
                let estimated_arrival = planned
                    .estimated_arrival
                    .as_deref()
                    .and_then(parse_epoch_or_none);
                let window_start = planned
                    .time_window
                    .as_ref()
                    .and_then(|w| w.start.as_deref())
                    .and_then(parse_epoch_or_none);
                let window_end = planned
                    .time_window
                    .as_ref()
                    .and_then(|w| w.end.as_deref())
                    .and_then(parse_epoch_or_none);
                for order_id in planned.concrete_order_ids() {
                    if !confirmable.contains(&order_id) {
                        continue;
                    }
                    let order = self.store.get_order(tenant, &order_id)?;
                    counter += 1;
                    sequence += 1;
                    let service_time_secs = order
                        .as_ref()
                        .and_then(|o| o.service_time_secs)
                        .unwrap_or(DEFAULT_SERVICE_TIME_SECS);
                    stops.push(RouteStop {
                        id: format!("{job_id}-stop-{counter:04}"),
                        tenant_id: tenant.to_string(),
                        job_id: job_id.to_string(),
                        route_id: route.route_id.clone(),
                        driver_id: route.driver_id.clone(),
                        vehicle_id: route.vehicle_id.clone(),
                        order_id,
                        sequence,
                        status: StopStatus::Pending,
                        address: planned.address.clone(),
                        latitude: planned.latitude,
                        longitude: planned.longitude,
                        estimated_arrival,
                        time_window_start: window_start
                            .or_else(|| order.as_ref().and_then(|o| o.time_window_start)),
                        time_window_end: window_end
                            .or_else(|| order.as_ref().and_then(|o| o.time_window_end)),
                        service_time_secs,
                        actual_arrival: None,
                        completed_at: None,
                        failure_reason: None,
                        evidence_urls: Vec::new(),
                        created_at: now,
                        updated_at: now,
                    });
                }
            }
        }
        Ok(stops)
    }
}
