//! Workflow registry — persistence-backed CRUD with validate-before-write.
//!
//! Every mutation builds a candidate graph first; invalid definitions
//! never reach storage, so [`WorkflowRegistry::load_graph`] always
//! succeeds for a tenant whose definitions went through here.

use thiserror::Error;
use tracing::debug;

use route_core::{WorkflowState, WorkflowTransition};
use routegrid_state::{StateError, StateStore};

use crate::graph::{WorkflowError, WorkflowGraph};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("workflow state not found: {0}")]
    StateNotFound(String),
}

/// Tenant workflow definitions over the state store.
#[derive(Clone)]
pub struct WorkflowRegistry {
    store: StateStore,
}

impl WorkflowRegistry {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Load the tenant's graph, falling back to the seeded five-state
    /// default when the tenant has no custom definitions.
    pub fn load_graph(&self, tenant: &str) -> Result<WorkflowGraph, RegistryError> {
        let states = self.store.list_workflow_states(tenant)?;
        if states.is_empty() {
            let (states, transitions) = WorkflowGraph::seed_defaults(tenant);
            return Ok(WorkflowGraph::build(states, transitions)?);
        }
        let transitions = self.store.list_workflow_transitions(tenant)?;
        Ok(WorkflowGraph::build(states, transitions)?)
    }

    pub fn list_states(&self, tenant: &str) -> Result<Vec<WorkflowState>, RegistryError> {
        Ok(self.store.list_workflow_states(tenant)?)
    }

    /// Add or update a custom state. Rejected if the resulting graph would
    /// violate an invariant.
    pub fn put_state(&self, state: WorkflowState) -> Result<(), RegistryError> {
        let tenant = state.tenant_id.clone();
        let mut states = self.store.list_workflow_states(&tenant)?;
        states.retain(|s| s.id != state.id);
        states.push(state.clone());
        let transitions = self.store.list_workflow_transitions(&tenant)?;
        WorkflowGraph::build(states, transitions)?;

        self.store.put_workflow_state(&state)?;
        debug!(%tenant, state_id = %state.id, "workflow state stored");
        Ok(())
    }

    /// Remove a custom state; transitions touching it are disabled so the
    /// remaining definitions still build.
    pub fn remove_state(&self, tenant: &str, state_id: &str) -> Result<(), RegistryError> {
        if !self.store.delete_workflow_state(tenant, state_id)? {
            return Err(RegistryError::StateNotFound(state_id.to_string()));
        }
        for mut t in self.store.list_workflow_transitions(tenant)? {
            if t.enabled && (t.from_state_id == state_id || t.to_state_id == state_id) {
                t.enabled = false;
                self.store.put_workflow_transition(&t)?;
            }
        }
        debug!(%tenant, %state_id, "workflow state removed");
        Ok(())
    }

    /// Enable or disable a transition. Enabling validates the candidate
    /// graph first.
    pub fn set_transition(&self, transition: WorkflowTransition) -> Result<(), RegistryError> {
        if transition.enabled {
            let tenant = transition.tenant_id.clone();
            let states = self.store.list_workflow_states(&tenant)?;
            let mut transitions = self.store.list_workflow_transitions(&tenant)?;
            transitions.retain(|t| {
                !(t.from_state_id == transition.from_state_id
                    && t.to_state_id == transition.to_state_id)
            });
            transitions.push(transition.clone());
            WorkflowGraph::build(states, transitions)?;
        }
        self.store.put_workflow_transition(&transition)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use route_core::{StateRequirements, StopStatus};

    fn registry() -> WorkflowRegistry {
        WorkflowRegistry::new(StateStore::open_in_memory().unwrap())
    }

    fn state(id: &str, system: StopStatus) -> WorkflowState {
        WorkflowState {
            id: id.to_string(),
            tenant_id: "acme".into(),
            label: id.to_string(),
            icon: None,
            system_state: system,
            is_terminal: system.is_terminal(),
            is_default: false,
            requirements: StateRequirements::default(),
        }
    }

    #[test]
    fn empty_tenant_gets_seeded_graph() {
        let registry = registry();
        let graph = registry.load_graph("acme").unwrap();
        assert!(graph.system_allowed(StopStatus::Pending, StopStatus::InProgress));
        assert!(graph.system_allowed(StopStatus::InProgress, StopStatus::Failed));
    }

    #[test]
    fn custom_states_replace_the_seed() {
        let registry = registry();
        registry.put_state(state("new", StopStatus::Pending)).unwrap();
        registry.put_state(state("out", StopStatus::InProgress)).unwrap();
        registry
            .set_transition(WorkflowTransition {
                tenant_id: "acme".into(),
                from_state_id: "new".into(),
                to_state_id: "out".into(),
                enabled: true,
            })
            .unwrap();

        let graph = registry.load_graph("acme").unwrap();
        assert!(graph.is_allowed("new", "out"));
        // The tenant defined no completion edge: the graph narrowed it away.
        assert!(!graph.system_allowed(StopStatus::InProgress, StopStatus::Completed));
    }

    #[test]
    fn invalid_transition_never_persists() {
        let registry = registry();
        registry.put_state(state("new", StopStatus::Pending)).unwrap();
        registry.put_state(state("done", StopStatus::Completed)).unwrap();

        let err = registry.set_transition(WorkflowTransition {
            tenant_id: "acme".into(),
            from_state_id: "new".into(),
            to_state_id: "done".into(),
            enabled: true,
        });
        assert!(matches!(
            err,
            Err(RegistryError::Workflow(WorkflowError::WidensCoreMachine { .. }))
        ));
        assert!(!registry.load_graph("acme").unwrap().is_allowed("new", "done"));
    }

    #[test]
    fn second_default_state_rejected() {
        let registry = registry();
        let mut a = state("a", StopStatus::Pending);
        a.is_default = true;
        registry.put_state(a).unwrap();
        let mut b = state("b", StopStatus::InProgress);
        b.is_default = true;
        assert!(matches!(
            registry.put_state(b),
            Err(RegistryError::Workflow(WorkflowError::MultipleDefaults(_, _)))
        ));
    }

    #[test]
    fn removing_a_state_disables_its_edges() {
        let registry = registry();
        registry.put_state(state("new", StopStatus::Pending)).unwrap();
        registry.put_state(state("out", StopStatus::InProgress)).unwrap();
        registry
            .set_transition(WorkflowTransition {
                tenant_id: "acme".into(),
                from_state_id: "new".into(),
                to_state_id: "out".into(),
                enabled: true,
            })
            .unwrap();

        registry.remove_state("acme", "out").unwrap();
        // Graph still builds; the dangling edge is disabled, not orphaned.
        let graph = registry.load_graph("acme").unwrap();
        assert!(!graph.is_allowed("new", "out"));
    }

    #[test]
    fn removing_unknown_state_errors() {
        let registry = registry();
        assert!(matches!(
            registry.remove_state("acme", "ghost"),
            Err(RegistryError::StateNotFound(_))
        ));
    }
}
