//! Stop transition engine.
//!
//! Legality comes from the tenant's workflow graph projected onto system
//! states; the graph is rebuilt from storage per transition so workflow
//! edits take effect immediately. Requirements of the target state are
//! enforced before anything is written.

use thiserror::Error;
use tracing::debug;

use route_core::*;
use routegrid_state::{StateError, StateStore};
use routegrid_workflow::{RegistryError, WorkflowRegistry};

#[derive(Debug, Error)]
pub enum StopError {
    #[error("route stop {0} not found")]
    StopNotFound(StopId),
    #[error("transition {from} -> {to} is not allowed")]
    IllegalTransition { from: StopStatus, to: StopStatus },
    #[error("workflow state {0} not found")]
    UnknownWorkflowState(StateId),
    #[error("workflow state {state_id} maps to {system}, not the requested status")]
    WorkflowStateMismatch { state_id: StateId, system: StopStatus },
    #[error("target state requires {0}")]
    MissingRequirement(&'static str),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    State(#[from] StateError),
}

/// One requested stop transition.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub new_status: StopStatus,
    /// Tenant-custom state the client is moving to. Resolves the
    /// requirements when the system-state mapping alone is ambiguous.
    pub workflow_state_id: Option<StateId>,
    pub actor: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub evidence_urls: Vec<String>,
    /// Overrides the recorded arrival time for IN_PROGRESS; defaults to
    /// the transition time.
    pub actual_arrival: Option<i64>,
}

/// The committed transition.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub stop: RouteStop,
    pub history_seq: u32,
    pub order_started: bool,
    pub order_completed: bool,
}

/// Applies validated transitions to stored route stops.
#[derive(Clone)]
pub struct StopEngine {
    store: StateStore,
    registry: WorkflowRegistry,
}

impl StopEngine {
    pub fn new(store: StateStore) -> Self {
        let registry = WorkflowRegistry::new(store.clone());
        Self { store, registry }
    }

    pub fn transition(
        &self,
        tenant: &str,
        stop_id: &str,
        req: &TransitionRequest,
    ) -> Result<TransitionOutcome, StopError> {
        let stop = self
            .store
            .get_stop(tenant, stop_id)?
            .ok_or_else(|| StopError::StopNotFound(stop_id.to_string()))?;

        let graph = self.registry.load_graph(tenant)?;
        if !graph.system_allowed(stop.status, req.new_status) {
            return Err(StopError::IllegalTransition {
                from: stop.status,
                to: req.new_status,
            });
        }

        let requirements = match &req.workflow_state_id {
            Some(state_id) => {
                let state = graph
                    .state(state_id)
                    .ok_or_else(|| StopError::UnknownWorkflowState(state_id.clone()))?;
                if state.system_state != req.new_status {
                    return Err(StopError::WorkflowStateMismatch {
                        state_id: state_id.clone(),
                        system: state.system_state,
                    });
                }
                Some(state.requirements)
            }
            // Without an explicit target state, requirements only apply
            // when exactly one custom state maps to the system status.
            None => graph.requirements_for_system(req.new_status),
        };
        if let Some(requirements) = requirements {
            if (requirements.photo || requirements.signature) && req.evidence_urls.is_empty() {
                return Err(StopError::MissingRequirement("evidence"));
            }
            if requirements.reason && req.reason.is_none() {
                return Err(StopError::MissingRequirement("reason"));
            }
            if requirements.notes && req.notes.is_none() {
                return Err(StopError::MissingRequirement("notes"));
            }
        }

        let now = now_epoch();
        let previous_status = stop.status;
        let mut updated = stop;
        updated.status = req.new_status;
        updated.updated_at = now;
        updated.evidence_urls.extend(req.evidence_urls.iter().cloned());
        match req.new_status {
            StopStatus::InProgress => {
                updated.actual_arrival = req.actual_arrival.or(Some(now));
            }
            StopStatus::Completed => {
                updated.completed_at = Some(now);
            }
            StopStatus::Failed => {
                updated.failure_reason = req.reason.clone();
            }
            _ => {}
        }

        let history = RouteStopHistory {
            stop_id: stop_id.to_string(),
            tenant_id: tenant.to_string(),
            seq: 0,
            previous_status,
            new_status: req.new_status,
            actor: req.actor.clone(),
            reason: req.reason.clone(),
            notes: req.notes.clone(),
            changed_at: now,
        };
        let commit = self.store.commit_stop_transition(tenant, &updated, &history)?;

        debug!(
            %tenant,
            %stop_id,
            from = %previous_status,
            to = %req.new_status,
            "stop transitioned"
        );
        Ok(TransitionOutcome {
            stop: updated,
            history_seq: commit.history_seq,
            order_started: commit.order_started,
            order_completed: commit.order_completed,
        })
    }

    pub fn history(
        &self,
        tenant: &str,
        stop_id: &str,
    ) -> Result<Vec<RouteStopHistory>, StopError> {
        if self.store.get_stop(tenant, stop_id)?.is_none() {
            return Err(StopError::StopNotFound(stop_id.to_string()));
        }
        Ok(self.store.list_stop_history(tenant, stop_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routegrid_state::ConfirmationStamp;

    fn request(to: StopStatus) -> TransitionRequest {
        TransitionRequest {
            new_status: to,
            workflow_state_id: None,
            actor: "driver-app".into(),
            reason: None,
            notes: None,
            evidence_urls: Vec::new(),
            actual_arrival: None,
        }
    }

    fn order(tenant: &str, id: &str, status: OrderStatus) -> Order {
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

    fn stop(tenant: &str, id: &str, order_id: &str, sequence: u32) -> RouteStop {
        RouteStop {
            id: id.to_string(),
            tenant_id: tenant.to_string(),
            job_id: "job-1".into(),
            route_id: "route-1".into(),
            driver_id: "drv-1".into(),
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

    fn metrics(tenant: &str) -> PlanMetrics {
        PlanMetrics {
            job_id: "job-1".into(),
            tenant_id: tenant.to_string(),
            route_count: 1,
            stop_count: 2,
            assigned_orders: 2,
            unassigned_orders: 0,
            total_distance: 1000.0,
            total_duration: 600.0,
            total_weight: 20.0,
            total_volume: 0.4,
            avg_utilization: 4.0,
            time_window_violations: 0,
            distance_delta_pct: None,
            duration_delta_pct: None,
            previous_job_id: None,
            computed_at: 1100,
        }
    }

    /// Confirmed plan with two stops on ord-1 and one on ord-2.
    fn seeded() -> (StateStore, StopEngine) {
        let store = StateStore::open_in_memory().unwrap();
        store
            .put_configuration(&PlanConfiguration {
                id: "cfg-1".into(),
                tenant_id: "acme".into(),
                status: ConfigStatus::Draft,
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
            })
            .unwrap();
        store.put_order(&order("acme", "ord-1", OrderStatus::Pending)).unwrap();
        store.put_order(&order("acme", "ord-2", OrderStatus::Pending)).unwrap();
        let stops = vec![
            stop("acme", "stop-1", "ord-1", 1),
            stop("acme", "stop-2", "ord-1", 2),
            stop("acme", "stop-3", "ord-2", 3),
        ];
        store
            .commit_confirmation(
                "acme",
                "cfg-1",
                &ConfirmationStamp {
                    confirmed_by: "dispatcher-1".into(),
                    confirmation_note: None,
                    plan_name: None,
                    now: 1100,
                },
                &["ord-1".to_string(), "ord-2".to_string()],
                &stops,
                &metrics("acme"),
            )
            .unwrap();
        let engine = StopEngine::new(store.clone());
        (store, engine)
    }

    #[test]
    fn happy_path_with_history_and_cascade() {
        let (store, engine) = seeded();

        let started = engine
            .transition("acme", "stop-1", &request(StopStatus::InProgress))
            .unwrap();
        assert!(started.order_started);
        assert!(started.stop.actual_arrival.is_some());
        assert_eq!(
            store.get_order("acme", "ord-1").unwrap().unwrap().status,
            OrderStatus::InProgress
        );

        let done = engine
            .transition("acme", "stop-1", &request(StopStatus::Completed))
            .unwrap();
        assert!(!done.order_completed, "stop-2 still open");
        assert!(done.stop.completed_at.is_some());

        engine
            .transition("acme", "stop-2", &request(StopStatus::InProgress))
            .unwrap();
        let last = engine
            .transition("acme", "stop-2", &request(StopStatus::Completed))
            .unwrap();
        assert!(last.order_completed);
        assert_eq!(
            store.get_order("acme", "ord-1").unwrap().unwrap().status,
            OrderStatus::Completed
        );

        let history = engine.history("acme", "stop-1").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].seq, 0);
        assert_eq!(history[1].new_status, StopStatus::Completed);
    }

    #[test]
    fn intermediate_states_cannot_be_skipped() {
        let (_, engine) = seeded();
        let err = engine
            .transition("acme", "stop-1", &request(StopStatus::Completed))
            .unwrap_err();
        assert!(matches!(
            err,
            StopError::IllegalTransition {
                from: StopStatus::Pending,
                to: StopStatus::Completed
            }
        ));
    }

    #[test]
    fn terminal_states_absorb() {
        let (_, engine) = seeded();
        engine
            .transition("acme", "stop-3", &request(StopStatus::Skipped))
            .unwrap();
        for to in StopStatus::all() {
            let err = engine.transition("acme", "stop-3", &request(to)).unwrap_err();
            assert!(matches!(err, StopError::IllegalTransition { .. }));
        }
    }

    #[test]
    fn failed_stop_records_reason_and_leaves_order() {
        let (store, engine) = seeded();
        engine
            .transition("acme", "stop-3", &request(StopStatus::InProgress))
            .unwrap();

        let mut req = request(StopStatus::Failed);
        req.reason = Some("recipient absent".into());
        let outcome = engine.transition("acme", "stop-3", &req).unwrap();

        assert_eq!(outcome.stop.failure_reason.as_deref(), Some("recipient absent"));
        assert!(!outcome.order_completed);
        assert_eq!(
            store.get_order("acme", "ord-2").unwrap().unwrap().status,
            OrderStatus::InProgress
        );
    }

    #[test]
    fn tenant_graph_narrows_the_core_machine() {
        let (store, engine) = seeded();
        let registry = WorkflowRegistry::new(store);
        let state = |id: &str, system: StopStatus| WorkflowState {
            id: id.to_string(),
            tenant_id: "acme".into(),
            label: id.to_string(),
            icon: None,
            system_state: system,
            is_terminal: system.is_terminal(),
            is_default: false,
            requirements: StateRequirements::default(),
        };
        registry.put_state(state("new", StopStatus::Pending)).unwrap();
        registry.put_state(state("driving", StopStatus::InProgress)).unwrap();
        registry.put_state(state("done", StopStatus::Completed)).unwrap();
        registry
            .set_transition(WorkflowTransition {
                tenant_id: "acme".into(),
                from_state_id: "new".into(),
                to_state_id: "driving".into(),
                enabled: true,
            })
            .unwrap();
        registry
            .set_transition(WorkflowTransition {
                tenant_id: "acme".into(),
                from_state_id: "driving".into(),
                to_state_id: "done".into(),
                enabled: true,
            })
            .unwrap();

        // SKIPPED was narrowed away for this tenant.
        let err = engine
            .transition("acme", "stop-1", &request(StopStatus::Skipped))
            .unwrap_err();
        assert!(matches!(err, StopError::IllegalTransition { .. }));
        engine
            .transition("acme", "stop-1", &request(StopStatus::InProgress))
            .unwrap();
    }

    #[test]
    fn requirements_of_the_target_state_are_enforced() {
        let (store, engine) = seeded();
        let registry = WorkflowRegistry::new(store);
        let (mut states, transitions) = {
            let (s, t) = routegrid_workflow::WorkflowGraph::seed_defaults("acme");
            (s, t)
        };
        for state in &mut states {
            if state.system_state == StopStatus::Completed {
                state.requirements.photo = true;
                state.requirements.notes = true;
            }
        }
        for state in states {
            registry.put_state(state).unwrap();
        }
        for transition in transitions {
            registry.set_transition(transition).unwrap();
        }

        engine
            .transition("acme", "stop-1", &request(StopStatus::InProgress))
            .unwrap();

        let err = engine
            .transition("acme", "stop-1", &request(StopStatus::Completed))
            .unwrap_err();
        assert!(matches!(err, StopError::MissingRequirement("evidence")));

        let mut req = request(StopStatus::Completed);
        req.evidence_urls = vec!["https://cdn.example/pod-1.jpg".into()];
        let err = engine.transition("acme", "stop-1", &req).unwrap_err();
        assert!(matches!(err, StopError::MissingRequirement("notes")));

        req.notes = Some("left with neighbour".into());
        let outcome = engine.transition("acme", "stop-1", &req).unwrap();
        assert_eq!(outcome.stop.evidence_urls.len(), 1);
    }

    #[test]
    fn explicit_workflow_state_must_match_the_status() {
        let (_, engine) = seeded();
        let mut req = request(StopStatus::InProgress);
        req.workflow_state_id = Some("sys-completed".into());
        let err = engine.transition("acme", "stop-1", &req).unwrap_err();
        assert!(matches!(err, StopError::WorkflowStateMismatch { .. }));

        req.workflow_state_id = Some("ghost".into());
        let err = engine.transition("acme", "stop-1", &req).unwrap_err();
        assert!(matches!(err, StopError::UnknownWorkflowState(_)));
    }

    #[test]
    fn unknown_stop_is_not_found() {
        let (_, engine) = seeded();
        assert!(matches!(
            engine.transition("acme", "ghost", &request(StopStatus::InProgress)),
            Err(StopError::StopNotFound(_))
        ));
        assert!(matches!(
            engine.history("acme", "ghost"),
            Err(StopError::StopNotFound(_))
        ));
    }

    #[test]
    fn stops_are_tenant_scoped() {
        let (_, engine) = seeded();
        assert!(matches!(
            engine.transition("other", "stop-1", &request(StopStatus::InProgress)),
            Err(StopError::StopNotFound(_))
        ));
    }
}
